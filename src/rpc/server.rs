//! Serves a [`Coordinator`] to remote clients.
//!
//! ```text
//!   transport.recv() ─▶ decode ─▶ dispatch(coordinator) ─▶ encode ─▶ transport.send()
//! ```
//!
//! One request is answered at a time per connection.  A malformed request
//! gets a `Response::Error` carrying the transport error and the seq it
//! arrived with (0 if even the header was unreadable).

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};

use super::protocol::{Envelope, PROTOCOL_VERSION, Request, Response, decode, encode, peek_header};
use super::transport::{StreamTransport, Transport};
use crate::coordinator::Coordinator;
use crate::error::{Error, TransportError};

pub struct RpcServer<C: ?Sized> {
    coordinator: Arc<C>,
}

impl<C: Coordinator + ?Sized + 'static> RpcServer<C> {
    pub fn new(coordinator: Arc<C>) -> Self {
        Self { coordinator }
    }

    /// Answer requests until the peer disconnects.
    pub fn serve<T: Transport>(&self, transport: &mut T) -> Result<(), TransportError> {
        loop {
            let frame = match transport.recv() {
                Ok(frame) => frame,
                Err(TransportError::Disconnected) => {
                    debug!("rpc: peer disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            let (seq, body) = match decode::<Request>(&frame) {
                Ok(env) => (env.seq, self.dispatch(env.body)),
                Err(e) => {
                    warn!("rpc: bad request: {e}");
                    let seq = peek_header(&frame).map(|(_, seq)| seq).unwrap_or(0);
                    (seq, Response::Error(Error::Transport(e)))
                }
            };

            let reply = Envelope {
                version: PROTOCOL_VERSION,
                seq,
                body,
            };
            transport.send(&encode(&reply)?)?;
        }
    }

    pub fn dispatch(&self, request: Request) -> Response {
        let c = &*self.coordinator;
        let result = match request {
            Request::GetSensors => c.get_sensors().map(Response::Sensors),
            Request::GetActiveAlarms => c.get_active_alarms().map(Response::ActiveAlarms),
            Request::GetLoggedAlarms => c.get_logged_alarms().map(Response::LoggedAlarms),
            Request::ClearLoggedAlarms => c.clear_logged_alarms().map(|()| Response::Ok),
            Request::SetControl(setting) => c.set_control(setting).map(|()| Response::Ok),
            Request::GetControl(name) => c.get_control(name).map(Response::Control),
            Request::Start => c.start().map(|()| Response::Ok),
            Request::Stop => c.stop().map(|()| Response::Ok),
            Request::IsRunning => c.is_running().map(Response::Running),
        };
        result.unwrap_or_else(Response::Error)
    }
}

/// Accept TCP clients forever, one thread per connection.
pub fn serve_tcp<C>(coordinator: Arc<C>, listener: TcpListener) -> std::io::Result<()>
where
    C: Coordinator + ?Sized + 'static,
{
    info!("rpc: listening on {}", listener.local_addr()?);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("rpc: accept failed: {e}");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());
        if let Err(e) = stream.set_nodelay(true) {
            warn!("rpc: client {peer}: TCP_NODELAY not set: {e}");
        }
        let server = RpcServer::new(Arc::clone(&coordinator));
        thread::Builder::new()
            .name("rpc-conn".into())
            .spawn(move || {
                info!("rpc: client {peer} connected");
                let mut transport = StreamTransport::new(stream);
                if let Err(e) = server.serve(&mut transport) {
                    warn!("rpc: client {peer} dropped: {e}");
                }
                info!("rpc: client {peer} closed");
            })?;
    }
    Ok(())
}
