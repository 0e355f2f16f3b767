//! RPC link failures as seen by a remote coordinator's caller.

use std::net::TcpListener;
use std::sync::Arc;

use ventcore::config::VentConfig;
use ventcore::coordinator::{Coordinator, CoordinatorLocal, CoordinatorRemote};
use ventcore::error::{Error, TransportError};
use ventcore::rpc::protocol::{Envelope, PROTOCOL_VERSION, Request, Response, decode, encode};
use ventcore::rpc::{ChannelTransport, RpcClient, RpcServer, Transport};

use crate::mock_hw::rig;

#[test]
fn peer_hangup_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        drop(stream);
    });

    let remote = CoordinatorRemote::connect(addr).unwrap();
    acceptor.join().unwrap();
    assert!(matches!(remote.get_sensors(), Err(Error::Transport(_))));
}

#[test]
fn connect_refused_is_transport_error() {
    let addr = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };
    assert!(matches!(
        CoordinatorRemote::connect(addr),
        Err(Error::Transport(_))
    ));
}

#[test]
fn stale_sequence_number_detected() {
    let (client, mut server) = ChannelTransport::pair();
    let peer = std::thread::spawn(move || {
        let frame = server.recv().unwrap();
        let req: Envelope<Request> = decode(&frame).unwrap();
        let reply = Envelope::new(req.seq + 1, Response::Running(false));
        server.send(&encode(&reply).unwrap()).unwrap();
    });

    let mut rpc = RpcClient::new(client);
    let err = rpc.call(Request::IsRunning).unwrap_err();
    assert!(matches!(err, TransportError::SequenceMismatch { .. }));
    peer.join().unwrap();
}

#[test]
fn server_answers_version_skew_with_error() {
    let c = Arc::new(CoordinatorLocal::new(rig(VentConfig::default()).module));
    let (mut client, mut server_end) = ChannelTransport::pair();
    let server = RpcServer::new(c);
    let t = std::thread::spawn(move || server.serve(&mut server_end));

    let skewed = Envelope {
        version: PROTOCOL_VERSION + 1,
        seq: 9,
        body: Request::GetSensors,
    };
    client.send(&encode(&skewed).unwrap()).unwrap();
    let reply: Envelope<Response> = decode(&client.recv().unwrap()).unwrap();
    assert_eq!(reply.seq, 9);
    assert_eq!(
        reply.body,
        Response::Error(Error::Transport(TransportError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: PROTOCOL_VERSION + 1,
        }))
    );

    drop(client);
    t.join().unwrap().unwrap();
}

#[test]
fn requests_on_one_connection_get_increasing_seq() {
    let c = Arc::new(CoordinatorLocal::new(rig(VentConfig::default()).module));
    let (client, mut server_end) = ChannelTransport::pair();
    let server = RpcServer::new(Arc::clone(&c));
    let t = std::thread::spawn(move || server.serve(&mut server_end));

    let mut rpc = RpcClient::new(client);
    for _ in 0..5 {
        assert_eq!(rpc.call(Request::IsRunning).unwrap(), Response::Running(false));
    }
    drop(rpc);
    t.join().unwrap().unwrap();
    assert!(!c.is_running().unwrap());
}
