use std::net::SocketAddr;
use std::time::Duration;

use chat_relay::{
    Envelope, ErrorCode, Kind, LoginRequest, MessageRequest, RelayConfig, RelayServer,
    ShutdownHandle,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    time::timeout,
};

struct Peer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send_raw(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn send<K: Kind>(&mut self, kind: K) {
        let line = kind.to_value().to_string();
        self.send_raw(&line).await;
    }

    async fn next_line(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("relay did not answer in time")
            .unwrap()
    }

    async fn recv(&mut self) -> Envelope {
        let line = self.next_line().await.expect("connection closed early");
        Envelope::from_json(&line).unwrap()
    }
}

async fn start() -> (RelayServer, SocketAddr, ShutdownHandle) {
    let config = RelayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        console: false,
        ..RelayConfig::default()
    };
    let server = RelayServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.shutdown_handle();
    (server, addr, handle)
}

fn error_code(envelope: &Envelope) -> ErrorCode {
    match envelope {
        Envelope::Error(error) => error.code(),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[tokio::test]
async fn login_messages_and_errors_flow_through_relay() {
    let (server, addr, handle) = start().await;

    let script = async move {
        let mut alice = Peer::connect(addr).await;
        alice.send(LoginRequest::new("alice")).await;
        match alice.recv().await {
            Envelope::LoginResponse(login) => assert_eq!(login.joining_username(), "alice"),
            other => panic!("expected a login, got {other:?}"),
        }

        // Duplicate name is reported to the requester only.
        let mut bob = Peer::connect(addr).await;
        bob.send(LoginRequest::new("alice")).await;
        assert_eq!(error_code(&bob.recv().await), ErrorCode::UserNameInUse);

        bob.send(LoginRequest::new("bob")).await;
        for peer in [&mut alice, &mut bob] {
            match peer.recv().await {
                Envelope::LoginResponse(login) => assert_eq!(login.joining_username(), "bob"),
                other => panic!("expected bob's login, got {other:?}"),
            }
        }

        alice.send(MessageRequest::new("alice", "hello bob")).await;
        for peer in [&mut alice, &mut bob] {
            match peer.recv().await {
                Envelope::MessageResponse(message) => {
                    assert_eq!(message.originator(), "alice");
                    assert_eq!(message.content(), "hello bob");
                }
                other => panic!("expected a message, got {other:?}"),
            }
        }

        // Garbage yields an error but keeps the connection usable.
        bob.send_raw("this is not json").await;
        assert_eq!(error_code(&bob.recv().await), ErrorCode::MalformedRequestUnknown);

        bob.send_raw(r#"{"type":"no.such.Kind","object":{}}"#).await;
        assert_eq!(error_code(&bob.recv().await), ErrorCode::MalformedRequestNoType);

        bob.send(MessageRequest::new("bob", "still here")).await;
        match alice.recv().await {
            Envelope::MessageResponse(message) => assert_eq!(message.originator(), "bob"),
            other => panic!("expected a message, got {other:?}"),
        }

        handle.shutdown();
        (alice, bob)
    };

    let (result, (mut alice, mut bob)) = tokio::join!(server.run(), script);
    result.unwrap();

    // Relay closed everything on the way out; skip bob's unread echo.
    assert!(alice.next_line().await.is_none());
    while bob.next_line().await.is_some() {}
}

#[tokio::test]
async fn message_before_login_is_rejected() {
    let (server, addr, handle) = start().await;

    let script = async move {
        let mut carol = Peer::connect(addr).await;
        carol.send(MessageRequest::new("carol", "anyone?")).await;
        assert_eq!(
            error_code(&carol.recv().await),
            ErrorCode::InvalidRequestFromClient
        );
        handle.shutdown();
    };

    let (result, ()) = tokio::join!(server.run(), script);
    result.unwrap();
}

#[tokio::test]
async fn disconnect_frees_username() {
    let (server, addr, handle) = start().await;

    let script = async move {
        let mut first = Peer::connect(addr).await;
        first.send(LoginRequest::new("dave")).await;
        assert!(matches!(first.recv().await, Envelope::LoginResponse(_)));
        drop(first);

        // The name may be reclaimed once the relay has seen the hangup.
        let mut second = Peer::connect(addr).await;
        let mut reclaimed = false;
        for _ in 0..20 {
            second.send(LoginRequest::new("dave")).await;
            match second.recv().await {
                Envelope::LoginResponse(_) => {
                    reclaimed = true;
                    break;
                }
                Envelope::Error(error) => {
                    assert_eq!(error.code(), ErrorCode::UserNameInUse);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(reclaimed);
        handle.shutdown();
    };

    let (result, ()) = tokio::join!(server.run(), script);
    result.unwrap();
}
