use consolefold::config::Config;

fn config(console_url: &str, job_status_url: Option<&str>) -> Config {
    Config {
        console_url: console_url.to_string(),
        job_status_url: job_status_url.map(str::to_string),
        poll_interval_ms: 5000,
        chunk_size: 1000,
        request_timeout_ms: 30_000,
        show_timestamps: false,
    }
}

#[test]
fn test_config_validation_rejects_non_http_console_url() {
    assert!(config("file:///var/log/console.log", None).validate().is_err());
    assert!(config("localhost:8153/console.log", None).validate().is_err());
}

#[test]
fn test_config_validation_accepts_http_endpoints() {
    let config = config(
        "https://ci.example.com/go/files/pipeline/1/stage/1/job/console.log",
        Some("https://ci.example.com/go/jobStatus.json?pipelineName=pipeline"),
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_rejects_bad_job_status_url() {
    assert!(config("http://127.0.0.1:8153/console.log", Some("jobStatus.json"))
        .validate()
        .is_err());
}

#[test]
fn test_config_from_lookup_applies_defaults() {
    let config = Config::from_lookup(|key| {
        (key == "CONSOLEFOLD_CONSOLE_URL").then(|| "http://127.0.0.1:8153/console.log".to_string())
    })
    .expect("config");

    assert_eq!(config.poll_interval_ms, 5000);
    assert_eq!(config.chunk_size, 1000);
    assert!(config.validate().is_ok());
}
