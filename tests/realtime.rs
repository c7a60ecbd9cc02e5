use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use studychat::{app, config::Config, db, AppState};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> (SocketAddr, AppState) {
    let db_pool = db::connect_in_memory().await.unwrap();
    let app_state = AppState::new(db_pool, Config::default());
    let app = app(app_state.clone()).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, app_state)
}

async fn connect(addr: SocketAddr, user: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws?senderId={user}-id&user={user}"))
        .await
        .unwrap();
    socket
}

async fn emit(socket: &mut Socket, frame: Value) {
    socket.send(Message::text(frame.to_string())).await.unwrap();
}

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for an event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn assert_silent(socket: &mut Socket) {
    assert!(
        timeout(Duration::from_millis(200), socket.next()).await.is_err(),
        "unexpected event"
    );
}

async fn join(socket: &mut Socket, room_id: &str) -> Vec<Value> {
    emit(socket, json!({"type": "join", "roomId": room_id})).await;
    let event = next_event(socket).await;
    assert_eq!(event["type"], "loadMessages");
    event["history"].as_array().unwrap().clone()
}

async fn say(socket: &mut Socket, room_id: &str, text: &str) {
    emit(socket, json!({"type": "sendMessage", "roomId": room_id, "text": text})).await;
}

#[tokio::test]
async fn study_hall_end_to_end() {
    let (addr, app_state) = spawn_server().await;
    let room = app_state.registry.create("Study Hall").await.unwrap();
    assert_eq!(room.id, "study-hall");

    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    assert!(join(&mut a, "study-hall").await.is_empty());
    assert!(join(&mut b, "study-hall").await.is_empty());

    say(&mut a, "study-hall", "hi").await;
    for socket in [&mut a, &mut b] {
        let event = next_event(socket).await;
        assert_eq!(event["type"], "receiveMessage");
        assert_eq!(event["message"]["text"], "hi");
        assert_eq!(event["message"]["roomId"], "study-hall");
        assert_eq!(event["message"]["user"], "A");
        assert_eq!(event["message"]["senderId"], "A-id");
        assert_silent(socket).await;
    }

    let mut c = connect(addr, "C").await;
    let history = join(&mut c, "study-hall").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["text"], "hi");
}

#[tokio::test]
async fn switching_rooms_over_the_wire() {
    let (addr, _) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut other = connect(addr, "Other").await;

    join(&mut a, "algebra").await;
    join(&mut a, "biology").await;

    say(&mut other, "algebra", "algebra only").await;
    assert_silent(&mut a).await;

    say(&mut other, "biology", "biology too").await;
    let event = next_event(&mut a).await;
    assert_eq!(event["message"]["text"], "biology too");
}

#[tokio::test]
async fn bad_frames_get_private_errors() {
    let (addr, _) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    join(&mut a, "algebra").await;
    join(&mut b, "algebra").await;

    say(&mut a, "algebra", "   ").await;
    let event = next_event(&mut a).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["code"], "VALIDATION_ERROR");

    emit(&mut a, json!({"type": "typing", "roomId": "algebra"})).await;
    let event = next_event(&mut a).await;
    assert_eq!(event["type"], "error");

    a.send(Message::text("not json")).await.unwrap();
    assert_eq!(next_event(&mut a).await["type"], "error");

    assert_silent(&mut b).await;

    say(&mut a, "algebra", "still connected").await;
    assert_eq!(next_event(&mut b).await["message"]["text"], "still connected");
}

#[tokio::test]
async fn closing_the_socket_releases_the_room() {
    let (addr, app_state) = spawn_server().await;
    let broadcaster = app_state.gateway.broadcaster().clone();

    let mut a = connect(addr, "A").await;
    join(&mut a, "algebra").await;
    assert_eq!(broadcaster.subscriber_count("algebra").await, 1);

    a.close(None).await.unwrap();

    timeout(Duration::from_secs(5), async {
        while broadcaster.subscriber_count("algebra").await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription was not released");
}
