//! Tests for the handler continuation engine

use std::io::Cursor;
use std::sync::Mutex;

use breeze::http::handler::{Handler, HandlerStatus, run_handler};
use breeze::http::request::{Method, Request, RequestBuilder};
use breeze::http::response::StatusCode;
use breeze::http::writer::{Completion, ResponseWriter};
use tokio::io::{AsyncReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Sends a fixed body in three phases and records what it saw.
#[derive(Default)]
struct Recording {
    events: Mutex<Vec<String>>,
}

enum Step {
    Body(Cursor<Vec<u8>>),
    Release,
}

impl Recording {
    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Handler for Recording {
    type File = Cursor<Vec<u8>>;
    type Phase = Step;

    fn handle<W>(
        &self,
        req: &Request,
        resp: &mut ResponseWriter<W, Self::File>,
    ) -> HandlerStatus<Step>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.log("handle");
        if req.path == "/status" {
            resp.send_status(StatusCode::BadRequest, Some("nope")).unwrap();
            return HandlerStatus::Done;
        }

        let body = b"phased".to_vec();
        resp.response_mut().content_length = Some(body.len() as u64);
        resp.send_headers().unwrap();
        HandlerStatus::Unfinished(Step::Body(Cursor::new(body)))
    }

    fn resume<W>(
        &self,
        phase: Step,
        completion: Completion<Self::File>,
        _req: &Request,
        resp: &mut ResponseWriter<W, Self::File>,
    ) -> HandlerStatus<Step>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match phase {
            Step::Body(file) => {
                self.log(format!("body ok={}", completion.is_success()));
                if !completion.is_success() {
                    self.log("release");
                    return HandlerStatus::Done;
                }
                let len = file.get_ref().len() as u64;
                resp.send_file(file, 0, len).unwrap();
                HandlerStatus::Unfinished(Step::Release)
            }
            Step::Release => {
                let cancelled = matches!(completion, Completion::Cancelled { .. });
                let file = completion.into_file();
                self.log(format!(
                    "release file={} cancelled={}",
                    file.is_some(),
                    cancelled
                ));
                HandlerStatus::Done
            }
        }
    }
}

/// Suspends without ever queuing a write.
struct Stalling {
    resumed: Mutex<Vec<bool>>,
}

impl Handler for Stalling {
    type File = Cursor<Vec<u8>>;
    type Phase = ();

    fn handle<W>(&self, _req: &Request, _resp: &mut ResponseWriter<W, Self::File>) -> HandlerStatus<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        HandlerStatus::Unfinished(())
    }

    fn resume<W>(
        &self,
        _phase: (),
        completion: Completion<Self::File>,
        _req: &Request,
        _resp: &mut ResponseWriter<W, Self::File>,
    ) -> HandlerStatus<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.resumed
            .lock()
            .unwrap()
            .push(matches!(completion, Completion::Idle));
        HandlerStatus::Unfinished(())
    }
}

fn get(path: &str) -> Request {
    RequestBuilder::new()
        .method(Method::GET)
        .path(path)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_phases_run_in_order() {
    let handler = Recording::default();
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let mut resp = ResponseWriter::new(server, "HTTP/1.1");
    let cancel = CancellationToken::new();

    run_handler(&handler, &get("/"), &mut resp, &cancel)
        .await
        .unwrap();

    assert_eq!(
        handler.events(),
        vec!["handle", "body ok=true", "release file=true cancelled=false"]
    );
    assert!(resp.response().is_done());

    drop(resp);
    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.ends_with("\r\n\r\nphased"));
}

#[tokio::test]
async fn test_done_flushes_final_status() {
    let handler = Recording::default();
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let mut resp = ResponseWriter::new(server, "HTTP/1.0");
    let cancel = CancellationToken::new();

    run_handler(&handler, &get("/status"), &mut resp, &cancel)
        .await
        .unwrap();

    assert_eq!(handler.events(), vec!["handle"]);

    drop(resp);
    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    assert!(out.starts_with("HTTP/1.0 400 Bad Request\r\n"));
    assert!(out.ends_with("nope"));
}

#[tokio::test]
async fn test_cancelled_connection_still_resumes_every_phase() {
    let handler = Recording::default();
    let (_client, server) = tokio::io::duplex(64 * 1024);
    let mut resp = ResponseWriter::new(server, "HTTP/1.1");
    let cancel = CancellationToken::new();
    cancel.cancel();

    run_handler(&handler, &get("/"), &mut resp, &cancel)
        .await
        .unwrap();

    assert_eq!(handler.events(), vec!["handle", "body ok=false", "release"]);
}

#[tokio::test]
async fn test_peer_gone_mid_body_releases_file() {
    let handler = Recording::default();
    let (client, server) = tokio::io::duplex(64 * 1024);
    let mut resp = ResponseWriter::new(server, "HTTP/1.1");
    let cancel = CancellationToken::new();

    // Headers land in the pipe buffer; the body write hits a closed peer.
    let req = get("/");
    let run = run_handler(&handler, &req, &mut resp, &cancel);
    let closer = async {
        drop(client);
    };
    let (res, ()) = tokio::join!(run, closer);

    assert!(res.is_ok());
    let events = handler.events();
    assert_eq!(events.first().map(String::as_str), Some("handle"));
    assert!(events.last().unwrap().starts_with("release"));
}

#[tokio::test]
async fn test_suspending_without_write_is_an_error() {
    let handler = Stalling {
        resumed: Mutex::new(Vec::new()),
    };
    let (_client, server) = tokio::io::duplex(1024);
    let mut resp = ResponseWriter::new(server, "HTTP/1.1");
    let cancel = CancellationToken::new();

    let res = run_handler(&handler, &get("/"), &mut resp, &cancel).await;

    assert!(res.is_err());
    assert_eq!(*handler.resumed.lock().unwrap(), vec![true]);
}
