//! Test-only helpers: snapshot builders, fixtures, and scripted chat models.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};

use crate::io::chat::{ChatModel, ChatRequest};
use crate::plan::TripPlan;

pub const APP_PACKAGE: &str = "lu.cfl.app";

/// Builder for one `<node>` element of a synthetic snapshot.
#[derive(Debug, Clone)]
pub struct UiNode {
    bounds: String,
    package: String,
    class: String,
    resource_id: String,
    text: String,
    desc: String,
    clickable: bool,
    enabled: bool,
    focusable: bool,
    focused: bool,
    children: Vec<UiNode>,
}

/// Start a node in the app package with the given bounds string.
pub fn ui(bounds: &str) -> UiNode {
    UiNode {
        bounds: bounds.to_string(),
        package: APP_PACKAGE.to_string(),
        class: "android.view.View".to_string(),
        resource_id: String::new(),
        text: String::new(),
        desc: String::new(),
        clickable: false,
        enabled: true,
        focusable: false,
        focused: false,
        children: Vec::new(),
    }
}

impl UiNode {
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.desc = desc.to_string();
        self
    }

    pub fn id(mut self, resource_id: &str) -> Self {
        self.resource_id = resource_id.to_string();
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    pub fn package(mut self, package: &str) -> Self {
        self.package = package.to_string();
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn focusable(mut self) -> Self {
        self.focusable = true;
        self
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }

    fn render(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        out.push_str(&format!(
            "{indent}<node text=\"{}\" resource-id=\"{}\" class=\"{}\" package=\"{}\" content-desc=\"{}\" clickable=\"{}\" enabled=\"{}\" focusable=\"{}\" focused=\"{}\" bounds=\"{}\"",
            escape(&self.text),
            escape(&self.resource_id),
            escape(&self.class),
            escape(&self.package),
            escape(&self.desc),
            self.clickable,
            self.enabled,
            self.focusable,
            self.focused,
            escape(&self.bounds),
        ));
        if self.children.is_empty() {
            out.push_str(" />\n");
            return;
        }
        out.push_str(">\n");
        for child in &self.children {
            child.render(depth + 1, out);
        }
        out.push_str(&format!("{indent}</node>\n"));
    }
}

/// Render top-level nodes into a uiautomator-style document.
pub fn hierarchy(nodes: Vec<UiNode>) -> String {
    let mut out =
        String::from("<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>\n<hierarchy rotation=\"0\">\n");
    for node in &nodes {
        node.render(1, &mut out);
    }
    out.push_str("</hierarchy>\n");
    out
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Deterministic plan used across tests.
pub fn sample_plan() -> TripPlan {
    TripPlan {
        start: "Luxembourg".to_string(),
        destination: "Arlon".to_string(),
        ..TripPlan::default()
    }
}

/// Load `tests/fixtures/<name>.xml`.
pub fn load_fixture(name: &str) -> Result<String> {
    let path = fixture_path(name);
    fs::read_to_string(&path).with_context(|| format!("read fixture {}", path.display()))
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(format!("{name}.xml"))
}

/// One canned chat reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Content(String),
    Fail(String),
}

/// Chat model that replays canned replies in order and records every request.
#[derive(Debug, Default)]
pub struct ScriptedChat {
    replies: RefCell<VecDeque<ScriptedReply>>,
    requests: RefCell<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn replying(content: &str) -> Self {
        Self::new(vec![ScriptedReply::Content(content.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![ScriptedReply::Fail(message.to_string())])
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.borrow().clone()
    }
}

impl ChatModel for ScriptedChat {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        match self.replies.borrow_mut().pop_front() {
            Some(ScriptedReply::Content(content)) => Ok(content),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted chat exhausted")),
        }
    }
}

/// Serve exactly one HTTP response on a fresh local port.
///
/// Returns the base URL and a handle yielding the raw request text.
pub fn serve_once(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let body = body.to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_request(&mut stream);
        let reason = match status {
            200 => "OK",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(response.as_bytes())
            .expect("write response");
        request
    });
    (base, handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
