//! The same scenario driven through every coordinator variant.  Callers
//! only see `dyn Coordinator`, so the local and remote variants must be
//! interchangeable.

use std::net::TcpListener;
use std::sync::Arc;

use ventcore::config::VentConfig;
use ventcore::coordinator::{Coordinator, CoordinatorLocal, CoordinatorRemote};
use ventcore::error::Error;
use ventcore::message::{ControlSetting, ValueName};
use ventcore::rpc::{ChannelTransport, RpcServer, serve_tcp};

use crate::mock_hw::{MockHardware, rig, wait_for};

fn local() -> Arc<CoordinatorLocal<MockHardware>> {
    Arc::new(CoordinatorLocal::new(rig(VentConfig::default()).module))
}

fn exercise(c: &dyn Coordinator) {
    assert!(!c.is_running().unwrap());
    assert_eq!(
        c.get_control(ValueName::Pip),
        Err(Error::NotFound(ValueName::Pip))
    );
    assert_eq!(c.get_sensors().unwrap().loop_counter, 0);

    c.start().unwrap();
    assert!(c.is_running().unwrap());
    wait_for("first snapshots", || {
        c.get_sensors().is_ok_and(|s| s.loop_counter > 20)
    });

    let peep = c.get_control(ValueName::Peep).unwrap();
    assert_eq!(peep.value, 5.0);
    c.set_control(ControlSetting { value: 7.5, ..peep }).unwrap();
    wait_for("promotion", || {
        c.get_control(ValueName::Peep).is_ok_and(|s| s.value == 7.5)
    });

    assert!(matches!(
        c.set_control(ControlSetting::new(ValueName::Flow, 1.0, 0.0, 2.0)),
        Err(Error::NotFound(ValueName::Flow))
    ));
    assert!(matches!(
        c.set_control(ControlSetting::new(ValueName::Peep, 50.0, 0.0, 100.0)),
        Err(Error::Range { .. })
    ));

    assert!(c.get_active_alarms().is_ok());
    assert!(c.get_logged_alarms().is_ok());

    c.stop().unwrap();
    assert!(!c.is_running().unwrap());

    let snap = c.get_sensors().unwrap();
    let pressure = c.get_sensor(ValueName::Pressure).unwrap();
    assert_eq!(pressure.value, snap.pressure);
    assert_eq!(pressure.loop_counter, snap.loop_counter);
    assert_eq!(
        c.get_sensor(ValueName::PipTime),
        Err(Error::NotFound(ValueName::PipTime))
    );

    // Stopped: nothing can raise an alarm between clear and read.
    c.clear_logged_alarms().unwrap();
    assert!(c.get_logged_alarms().unwrap().is_empty());
}

#[test]
fn local_coordinator() {
    let c = local();
    exercise(c.as_ref());
    assert!(c.module().errors().is_empty());
}

#[test]
fn remote_coordinator_over_channel() {
    let c = local();
    let (client, mut server_end) = ChannelTransport::pair();
    let server = RpcServer::new(Arc::clone(&c));
    let t = std::thread::spawn(move || server.serve(&mut server_end));

    let remote: Arc<dyn Coordinator> = Arc::new(CoordinatorRemote::new(client));
    exercise(remote.as_ref());

    // After stop the snapshot is frozen; both sides must agree exactly,
    // sub-second timestamp included.
    assert_eq!(remote.get_sensors().unwrap(), c.get_sensors().unwrap());
    assert_eq!(
        remote.get_control(ValueName::Peep).unwrap(),
        c.get_control(ValueName::Peep).unwrap()
    );

    drop(remote);
    assert!(t.join().unwrap().is_ok(), "server ends cleanly on disconnect");
}

#[test]
fn remote_coordinator_over_tcp() {
    let c = local();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let served = Arc::clone(&c);
    std::thread::spawn(move || serve_tcp(served, listener));

    let remote = CoordinatorRemote::connect(addr).unwrap();
    exercise(&remote);
    assert_eq!(remote.get_sensors().unwrap(), c.get_sensors().unwrap());
}
