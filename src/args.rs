use clap::Parser;
use secrecy::SecretString;
use std::{
    fmt::{Debug, Display},
    path::PathBuf,
    str::FromStr,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Repository URLs. The input file is read when none are given.
    #[clap(value_name = "URL")]
    pub urls: Vec<String>,

    /// File with one repository URL per line
    #[clap(short, long, env, default_value = "input.txt")]
    pub input: PathBuf,

    /// JSON file the results are written to
    #[clap(short, long, env, default_value = "output.json")]
    pub output: PathBuf,

    /// GitHub personal access token
    #[clap(long, env)]
    pub github_token: Option<SecretString>,

    /// GitLab personal access token
    #[clap(long, env)]
    pub gitlab_token: Option<SecretString>,

    /// GitHub API URL
    #[clap(long, env, default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// GitLab API URL used for every GitLab host. Defaults to https://<host>/api/v4
    #[clap(long, env)]
    pub gitlab_api_url: Option<String>,

    /// Additional self-hosted GitLab hosts
    #[clap(long = "gitlab-host", env = "GITLAB_HOSTS", use_value_delimiter = true)]
    pub gitlab_hosts: Vec<String>,

    /// Repositories processed in parallel
    #[clap(short, long, env, default_value_t = 1, parse(try_from_str=concurrency_in_range))]
    pub concurrency: usize,

    /// Attempts of a request failing with a server or network error
    #[clap(long, env, default_value_t = 3, parse(try_from_str=max_attempts_in_range))]
    pub max_attempts: u32,

    /// Initial delay between retries, doubled on every retry
    #[clap(long, env, default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Timeout of a single HTTP request in seconds
    #[clap(long, env, default_value_t = 30, parse(try_from_str=request_timeout_in_range))]
    pub request_timeout: u64,

    /// Keep results of an existing output file and skip their repositories
    #[clap(long, env)]
    pub resume: bool,
}

fn concurrency_in_range(value: &str) -> clap::Result<usize, String> {
    number_in_range(value, 1, 64, "concurrency".to_string())
}

fn max_attempts_in_range(value: &str) -> clap::Result<u32, String> {
    number_in_range(value, 1, 100, "max_attempts".to_string())
}

fn request_timeout_in_range(value: &str) -> clap::Result<u64, String> {
    number_in_range(value, 1, 3600, "request_timeout".to_string())
}

fn number_in_range<T>(value: &str, min: T, max: T, name: String) -> clap::Result<T, String>
where
    T: FromStr + PartialOrd + Display,
    <T as FromStr>::Err: Display,
{
    value.parse::<T>().map_err(|err| format!("{}", err)).and_then(|value| {
        if value < min || value > max {
            return Err(format!("{} is not in range {} .. {}.", name, min, max));
        }
        Ok(value)
    })
}
