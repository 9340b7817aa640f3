//! In-process RESP2 store for integration tests.
//!
//! Speaks the handful of commands the backend issues, keeps one map per
//! logical database, and counts accepted connections so tests can check
//! pool bounds.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use hkv_client::{parse_response, RespValue};

type Databases = HashMap<u32, HashMap<Vec<u8>, Vec<u8>>>;

/// Running store; the accept loop stops when this is dropped.
pub struct TestStore {
    pub addr: String,
    data: Arc<Mutex<Databases>>,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl TestStore {
    /// Binds to an ephemeral port and starts accepting.
    pub async fn spawn(password: Option<&'static str>) -> TestStore {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let data = Arc::new(Mutex::new(Databases::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let handle = {
            let data = data.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(handle_connection(stream, data.clone(), password));
                }
            })
        };

        TestStore {
            addr,
            data,
            connections,
            handle,
        }
    }

    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Raw bytes stored under `key` in `db`.
    pub fn raw(&self, db: u32, key: &str) -> Option<Vec<u8>> {
        self.data.lock().get(&db).and_then(|map| map.get(key.as_bytes()).cloned())
    }

    /// Writes directly into the store, bypassing the backend.
    pub fn put_raw(&self, db: u32, key: &str, value: &[u8]) {
        self.data.lock().entry(db).or_default().insert(key.as_bytes().to_vec(), value.to_vec());
    }
}

impl Drop for TestStore {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

struct Session {
    db: u32,
    authenticated: bool,
}

async fn handle_connection(mut stream: TcpStream, data: Arc<Mutex<Databases>>, password: Option<&'static str>) {
    let mut buffer = BytesMut::with_capacity(8 * 1024);
    let mut session = Session {
        db: 0,
        authenticated: password.is_none(),
    };

    loop {
        match stream.read_buf(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        loop {
            match parse_response(&mut buffer) {
                Ok(Some(RespValue::Array(Some(items)))) => {
                    let args: Vec<Vec<u8>> = items
                        .into_iter()
                        .filter_map(|item| match item {
                            RespValue::Bulk(Some(arg)) => Some(arg),
                            _ => None,
                        })
                        .collect();
                    let response = dispatch_command(&args, &data, &mut session, password);
                    if stream.write_all(&response).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Ok(Some(_)) | Err(_) => {
                    let _ = stream.write_all(&resp_error("protocol error")).await;
                    return;
                }
            }
        }
    }
}

fn dispatch_command(
    args: &[Vec<u8>],
    data: &Mutex<Databases>,
    session: &mut Session,
    password: Option<&'static str>,
) -> Vec<u8> {
    if args.is_empty() {
        return resp_error("empty command");
    }

    let cmd = args[0].to_ascii_uppercase();
    if cmd == b"AUTH" {
        return handle_auth(args, session, password);
    }
    if !session.authenticated {
        return b"-NOAUTH Authentication required.\r\n".to_vec();
    }

    let mut dbs = data.lock();
    let db = dbs.entry(session.db).or_default();
    match cmd.as_slice() {
        b"PING" => resp_simple("PONG"),
        b"SELECT" => match args.get(1).and_then(|arg| parse_u64(arg)) {
            Some(index) if args.len() == 2 => {
                session.db = index as u32;
                resp_simple("OK")
            }
            _ => resp_error("invalid DB index"),
        },
        b"GET" if args.len() == 2 => match db.get(&args[1]) {
            Some(value) => resp_bulk(value),
            None => resp_null(),
        },
        b"SET" if args.len() >= 3 => {
            let options: Vec<Vec<u8>> = args[3..].iter().map(|arg| arg.to_ascii_uppercase()).collect();
            match options.as_slice() {
                [] => {}
                [nx] if nx == b"NX" => {
                    if db.contains_key(&args[1]) {
                        return resp_null();
                    }
                }
                [ex, secs] if ex == b"EX" && parse_u64(secs).is_some_and(|s| s > 0) => {}
                _ => return resp_error("syntax error"),
            }
            db.insert(args[1].clone(), args[2].clone());
            resp_simple("OK")
        }
        b"DEL" if args.len() >= 2 => {
            let removed = args[1..].iter().filter(|key| db.remove(*key).is_some()).count();
            resp_integer(removed as i64)
        }
        b"EXISTS" if args.len() >= 2 => {
            let found = args[1..].iter().filter(|key| db.contains_key(*key)).count();
            resp_integer(found as i64)
        }
        b"FLUSHDB" => {
            db.clear();
            resp_simple("OK")
        }
        _ => resp_error("unknown command or wrong number of arguments"),
    }
}

fn handle_auth(args: &[Vec<u8>], session: &mut Session, password: Option<&'static str>) -> Vec<u8> {
    match (password, args.get(1)) {
        (Some(expected), Some(given)) if args.len() == 2 && given == expected.as_bytes() => {
            session.authenticated = true;
            resp_simple("OK")
        }
        (None, _) => resp_error("Client sent AUTH, but no password is set"),
        _ => b"-WRONGPASS invalid password\r\n".to_vec(),
    }
}

fn resp_simple(message: &str) -> Vec<u8> {
    format!("+{message}\r\n").into_bytes()
}

fn resp_error(message: &str) -> Vec<u8> {
    format!("-ERR {message}\r\n").into_bytes()
}

fn resp_integer(value: i64) -> Vec<u8> {
    format!(":{value}\r\n").into_bytes()
}

fn resp_bulk(data: &[u8]) -> Vec<u8> {
    let mut buf = format!("${}\r\n", data.len()).into_bytes();
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

fn resp_null() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

fn parse_u64(arg: &[u8]) -> Option<u64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}
