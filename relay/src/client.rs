use crate::{
    RelayErrors,
    frame::{read_frame, write_frame},
    packet::{CommandPacket, ImuPacket, Packet},
};
use allocation::Wrench;
use hardware::{
    ActuatorSink, HardwareErrors, ImuReading, Measurement, SensorSnapshot, SensorSource,
    validate_command,
};
use mission::{BehaviorResult, Subtask};
use std::{
    cell::RefCell,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    rc::Rc,
    time::Duration,
};

/// Vehicle side of the relay. Blocking calls give up after the timeout
/// passed to [`SimulationClient::connect`].
///
/// Any failed exchange drops the connection: a late reply left in the socket
/// would otherwise answer the next request. Calls then fail with
/// [`RelayErrors::Disconnected`] until [`reconnect`](Self::reconnect).
#[derive(Debug)]
pub struct SimulationClient {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    timeout: Duration,
    last_imu: ImuPacket,
}

impl SimulationClient {
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self, RelayErrors> {
        if timeout.is_zero() {
            return Err(RelayErrors::InvalidTimeout(timeout));
        }
        let mut last_error = None;
        for addr in addr.to_socket_addrs()? {
            match open(addr, timeout) {
                Ok(stream) => {
                    log::info!("connected to simulation at {addr}");
                    return Ok(Self {
                        stream: Some(stream),
                        peer: addr,
                        timeout,
                        last_imu: ImuPacket::default(),
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| std::io::Error::other("address resolved to nothing"))
            .into())
    }

    pub fn shared(self) -> Rc<RefCell<SimulationClient>> {
        Rc::new(RefCell::new(self))
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens a fresh connection to the same server, discarding the old one.
    pub fn reconnect(&mut self) -> Result<(), RelayErrors> {
        self.stream = None;
        self.stream = Some(open(self.peer, self.timeout)?);
        log::info!("reconnected to simulation at {}", self.peer);
        Ok(())
    }

    pub fn set(&mut self, index: usize, command: f64) -> Result<(), RelayErrors> {
        let packet = Packet::Command(CommandPacket {
            index: index as u32,
            command,
        });
        self.exchange(|stream| write_frame(stream, &packet.encode()))
    }

    /// Asks the server for telemetry and waits for the reply.
    pub fn fetch(&mut self) -> Result<ImuPacket, RelayErrors> {
        let bytes = self.exchange(|stream| {
            write_frame(stream, &Packet::RequestTelemetry.encode())?;
            read_frame(stream)
        })?;
        match Packet::decode(&bytes)? {
            Packet::Imu(imu) => {
                self.last_imu = imu;
                Ok(imu)
            }
            other => Err(RelayErrors::UnexpectedPacket("imu telemetry", other.tag())),
        }
    }

    /// Telemetry from the most recent successful [`fetch`](Self::fetch).
    pub fn last_imu(&self) -> ImuPacket {
        self.last_imu
    }

    fn exchange<T>(
        &mut self,
        f: impl FnOnce(&mut TcpStream) -> Result<T, RelayErrors>,
    ) -> Result<T, RelayErrors> {
        let stream = self.stream.as_mut().ok_or(RelayErrors::Disconnected)?;
        match f(stream) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("dropping connection to {}: {e}", self.peer);
                self.stream = None;
                Err(e)
            }
        }
    }
}

fn open(addr: SocketAddr, timeout: Duration) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Sends one thruster's commands over the relay.
pub struct RemoteThruster {
    client: Rc<RefCell<SimulationClient>>,
    index: usize,
}

impl RemoteThruster {
    pub fn new(client: Rc<RefCell<SimulationClient>>, index: usize) -> Self {
        Self { client, index }
    }
}

impl ActuatorSink for RemoteThruster {
    /// Zero on a dropped link counts as delivered: the server stops every
    /// thruster when its client goes away.
    fn send(&mut self, command: f64) -> Result<(), HardwareErrors> {
        let command = validate_command(command)?;
        let mut client = self.client.borrow_mut();
        if command == 0.0 && !client.is_connected() {
            return Ok(());
        }
        Ok(client.set(self.index, command)?)
    }
}

/// Reports the last telemetry fetched by [`UpdateSimClient`].
pub struct RemoteImu {
    client: Rc<RefCell<SimulationClient>>,
}

impl RemoteImu {
    pub fn new(client: Rc<RefCell<SimulationClient>>) -> Self {
        Self { client }
    }
}

impl SensorSource for RemoteImu {
    fn name(&self) -> &str {
        "remote imu"
    }

    fn read(&mut self, _timeout: Duration) -> Result<Measurement, HardwareErrors> {
        let client = self.client.borrow();
        if !client.is_connected() {
            return Err(RelayErrors::Disconnected.into());
        }
        let imu = client.last_imu();
        Ok(Measurement::Imu(ImuReading::new(imu.attitude, imu.acceleration)))
    }
}

/// Pulls fresh telemetry once per tick.
pub struct UpdateSimClient {
    client: Rc<RefCell<SimulationClient>>,
}

impl UpdateSimClient {
    pub fn new(client: Rc<RefCell<SimulationClient>>) -> Self {
        Self { client }
    }
}

impl Subtask for UpdateSimClient {
    fn name(&self) -> &str {
        "update sim client"
    }

    fn produce(&mut self, _sensors: &SensorSnapshot) -> BehaviorResult {
        self.client.borrow_mut().fetch()?;
        Ok(Wrench::body())
    }
}
