//! ZeroMQ channel implementations.
//!
//! Socket roles follow the wire contract: a REP socket bound for control
//! request/reply, a PUB socket bound for events, and one conflated SUB socket
//! connected per detector endpoint with no topic filter.

use std::error::Error;
use std::time::Duration;

use crate::error::{Result, TransportError};
use filterctl_traits::{ControlChannel, DataChannel, EventChannel};

fn timeout_ms(timeout: Duration) -> i64 {
    timeout.as_millis().min(i64::MAX as u128) as i64
}

/// REP socket serving the command surface.
pub struct ZmqControlChannel {
    socket: zmq::Socket,
}

impl ZmqControlChannel {
    pub fn bind(context: &zmq::Context, port: u16) -> Result<Self> {
        let socket = context.socket(zmq::REP)?;
        socket.bind(&format!("tcp://*:{port}"))?;
        Ok(Self { socket })
    }
}

impl ControlChannel for ZmqControlChannel {
    fn recv_request(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<String>, Box<dyn Error + Send + Sync>> {
        if self.socket.poll(zmq::POLLIN, timeout_ms(timeout))? == 0 {
            return Ok(None);
        }
        match self.socket.recv_string(0)? {
            Ok(request) => Ok(Some(request)),
            // A REP socket must still reply; hand the bytes up lossily so the
            // server can answer with a failure.
            Err(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        }
    }

    fn send_reply(
        &mut self,
        reply: &str,
    ) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.socket.send(reply, 0)?;
        Ok(())
    }
}

/// One conflated SUB socket per detector endpoint.
pub struct ZmqDataChannel {
    sockets: Vec<zmq::Socket>,
}

impl ZmqDataChannel {
    pub fn connect(context: &zmq::Context, endpoints: &[String]) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(TransportError::Endpoint(
                "no subscribe endpoints given".into(),
            ));
        }
        let mut sockets = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if endpoint.is_empty() {
                return Err(TransportError::Endpoint(endpoint.clone()));
            }
            let socket = context.socket(zmq::SUB)?;
            // Conflate before connecting: keep only the newest undelivered
            // message per peer.
            socket.set_conflate(true)?;
            socket.connect(&format!("tcp://{endpoint}"))?;
            socket.set_subscribe(b"")?;
            tracing::info!(endpoint = %endpoint, "subscribed to data endpoint");
            sockets.push(socket);
        }
        Ok(Self { sockets })
    }
}

impl DataChannel for ZmqDataChannel {
    fn poll(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let mut items: Vec<zmq::PollItem<'_>> = self
            .sockets
            .iter()
            .map(|socket| socket.as_poll_item(zmq::POLLIN))
            .collect();
        zmq::poll(&mut items, timeout_ms(timeout))?;
        let readable: Vec<bool> = items.iter().map(|item| item.is_readable()).collect();
        drop(items);

        let mut payloads = Vec::new();
        for (socket, ready) in self.sockets.iter().zip(readable) {
            if !ready {
                continue;
            }
            match socket.recv_string(zmq::DONTWAIT) {
                Ok(Ok(payload)) => payloads.push(payload),
                Ok(Err(bytes)) => {
                    tracing::warn!(len = bytes.len(), "dropping non-utf8 data message");
                }
                Err(zmq::Error::EAGAIN) => {}
                Err(e) => tracing::warn!(error = %e, "data receive failed"),
            }
        }
        Ok(payloads)
    }
}

/// PUB socket for the per-frame event stream.
pub struct ZmqEventChannel {
    socket: zmq::Socket,
}

impl ZmqEventChannel {
    pub fn bind(context: &zmq::Context, port: u16) -> Result<Self> {
        let socket = context.socket(zmq::PUB)?;
        socket.bind(&format!("tcp://*:{port}"))?;
        Ok(Self { socket })
    }
}

impl EventChannel for ZmqEventChannel {
    fn publish(&mut self, payload: &str) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.socket.send(payload, 0)?;
        Ok(())
    }
}
