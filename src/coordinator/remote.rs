//! Cross-process coordinator: every call is one RPC round trip.
//!
//! Link failures come back as [`Error::Transport`]; errors raised by the
//! remote coordinator itself come back unchanged.

use std::collections::BTreeMap;
use std::net::{TcpStream, ToSocketAddrs};

use log::{error, warn};
use parking_lot::Mutex;

use super::Coordinator;
use crate::error::{Error, Result, TransportError};
use crate::message::{Alarm, ControlSetting, SensorValues, ValueName};
use crate::rpc::protocol::{Request, Response};
use crate::rpc::{RpcClient, StreamTransport, Transport};

pub struct CoordinatorRemote<T> {
    client: Mutex<RpcClient<T>>,
}

impl<T: Transport> CoordinatorRemote<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: Mutex::new(RpcClient::new(transport)),
        }
    }

    fn call(&self, request: Request) -> Result<Response> {
        match self.client.lock().call(request) {
            Ok(Response::Error(e)) => Err(e),
            Ok(response) => Ok(response),
            Err(e) => {
                error!("rpc: call failed: {e}");
                Err(Error::Transport(e))
            }
        }
    }
}

impl CoordinatorRemote<StreamTransport<TcpStream>> {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(TransportError::from)?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("rpc: TCP_NODELAY not set: {e}");
        }
        Ok(Self::new(StreamTransport::new(stream)))
    }
}

fn unexpected<V>() -> Result<V> {
    error!("rpc: response does not match request");
    Err(Error::Transport(TransportError::UnexpectedResponse))
}

impl<T: Transport> Coordinator for CoordinatorRemote<T> {
    fn get_sensors(&self) -> Result<SensorValues> {
        match self.call(Request::GetSensors)? {
            Response::Sensors(v) => Ok(v),
            _ => unexpected(),
        }
    }

    fn get_active_alarms(&self) -> Result<BTreeMap<String, Alarm>> {
        match self.call(Request::GetActiveAlarms)? {
            Response::ActiveAlarms(a) => Ok(a),
            _ => unexpected(),
        }
    }

    fn get_logged_alarms(&self) -> Result<Vec<Alarm>> {
        match self.call(Request::GetLoggedAlarms)? {
            Response::LoggedAlarms(a) => Ok(a),
            _ => unexpected(),
        }
    }

    fn clear_logged_alarms(&self) -> Result<()> {
        match self.call(Request::ClearLoggedAlarms)? {
            Response::Ok => Ok(()),
            _ => unexpected(),
        }
    }

    fn set_control(&self, setting: ControlSetting) -> Result<()> {
        match self.call(Request::SetControl(setting))? {
            Response::Ok => Ok(()),
            _ => unexpected(),
        }
    }

    fn get_control(&self, name: ValueName) -> Result<ControlSetting> {
        match self.call(Request::GetControl(name))? {
            Response::Control(s) => Ok(s),
            _ => unexpected(),
        }
    }

    fn start(&self) -> Result<()> {
        match self.call(Request::Start)? {
            Response::Ok => Ok(()),
            _ => unexpected(),
        }
    }

    fn stop(&self) -> Result<()> {
        match self.call(Request::Stop)? {
            Response::Ok => Ok(()),
            _ => unexpected(),
        }
    }

    fn is_running(&self) -> Result<bool> {
        match self.call(Request::IsRunning)? {
            Response::Running(r) => Ok(r),
            _ => unexpected(),
        }
    }
}
