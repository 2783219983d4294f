use crate::{EngineError, Result};
use std::io::Read;
use std::time::Duration;
use url::Url;

const MAX_PAGE_HTML_BYTES: u64 = 2 * 1024 * 1024;

pub fn build_http_agent(timeout_secs: u64, user_agent: &str) -> ureq::Agent {
    let mut config = ureq::Agent::config_builder();
    config = config
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(timeout_secs.max(1))))
        .user_agent(user_agent.to_string());
    config.build().into()
}

pub fn fetch_html(agent: &ureq::Agent, url: &str) -> Result<String> {
    let mut response = agent.get(url).call().map_err(|err| EngineError::Request {
        url: redact_url_for_log(url),
        detail: err.to_string(),
    })?;

    let status = response.status().as_u16();
    if status >= 400 {
        return Err(EngineError::HttpStatus {
            status,
            url: redact_url_for_log(url),
        });
    }

    let mut buf = Vec::new();
    response
        .body_mut()
        .as_reader()
        .take(MAX_PAGE_HTML_BYTES)
        .read_to_end(&mut buf)
        .map_err(|err| EngineError::Request {
            url: redact_url_for_log(url),
            detail: err.to_string(),
        })?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn fetch_binary(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    let mut response = agent.get(url).call().map_err(|err| EngineError::Request {
        url: redact_url_for_log(url),
        detail: err.to_string(),
    })?;

    let status = response.status().as_u16();
    if status >= 400 {
        return Err(EngineError::HttpStatus {
            status,
            url: redact_url_for_log(url),
        });
    }

    let mut data = Vec::new();
    response
        .body_mut()
        .as_reader()
        .read_to_end(&mut data)
        .map_err(|err| EngineError::Request {
            url: redact_url_for_log(url),
            detail: err.to_string(),
        })?;

    if data.is_empty() {
        return Err(EngineError::EmptyBody {
            url: redact_url_for_log(url),
        });
    }

    Ok(data)
}

pub fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            let authority = parsed.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}
