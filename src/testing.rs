use crate::{
    error::{Error, Result},
    transport::Transport,
};
use serde_json::Value;
use std::{collections::HashMap, io::Write, sync::Mutex};

#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

#[derive(Default)]
pub struct FakeTransport {
    posts: Mutex<HashMap<String, Value>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    pub recorded: Mutex<Vec<RecordedPost>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, value: Value) -> Self {
        self.posts.lock().unwrap().insert(url.to_string(), value);
        self
    }

    pub fn serve(self, url: &str, bytes: &[u8]) -> Self {
        self.files.lock().unwrap().insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.recorded.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<Value> {
        self.recorded.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: body.clone(),
        });
        self.posts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("HTTP 404 from {url}")))
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.downloads.lock().unwrap().push(url.to_string());
        let bytes = self
            .files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("HTTP 404 from {url}")))?;
        sink.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}
