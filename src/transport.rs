use crate::error::{Error, Result};
use serde_json::Value;
use std::{
    io::{self, Read, Write},
    time::Duration,
};

pub const DEFAULT_USER_AGENT: &str = concat!("modsentry/", env!("CARGO_PKG_VERSION"));

pub trait Transport: Send + Sync {
    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<Value>;

    /// Streams `url` into `sink`, returning the number of bytes written.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
        }
    }
}

pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(options: &HttpOptions) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout_read(options.read_timeout)
            .timeout_write(options.read_timeout)
            .build();
        Self {
            agent,
            user_agent: options.user_agent.clone(),
        }
    }
}

impl Transport for UreqTransport {
    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<Value> {
        let mut request = self
            .agent
            .post(url)
            .set("User-Agent", &self.user_agent)
            .set("Accept", "application/json");
        for &(name, value) in headers {
            request = request.set(name, value);
        }
        let response = request.send_json(body)?;
        let value: Value = response
            .into_json()
            .map_err(|err| Error::Parse(format!("decode response from {url}: {err}")))?;
        Ok(value)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        let response = self
            .agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .call()?;
        copy_body(response.into_reader(), sink, url)
    }
}

fn copy_body(reader: impl Read, sink: &mut dyn Write, url: &str) -> Result<u64> {
    let mut body = BodyReader {
        inner: reader,
        failed: false,
    };
    let written = io::copy(&mut body, &mut *sink).map_err(|err| {
        if body.failed {
            Error::Network(format!("read {url}: {err}"))
        } else {
            Error::Io(err)
        }
    })?;
    sink.flush()?;
    Ok(written)
}

// Remembers whether a copy failed on the network side or the disk side.
struct BodyReader<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        if matches!(&result, Err(err) if err.kind() != io::ErrorKind::Interrupted) {
            self.failed = true;
        }
        result
    }
}
