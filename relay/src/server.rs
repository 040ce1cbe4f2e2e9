use crate::{
    RelayErrors,
    frame::{read_frame, write_frame},
    packet::{ImuPacket, Packet},
};
use std::{
    error::Error,
    io::ErrorKind,
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

/// Simulation side of the relay.
pub trait TelemetrySource {
    fn set_command(&mut self, index: usize, command: f64) -> Result<(), Box<dyn Error>>;
    /// Moves the simulation forward by `dt` seconds.
    fn advance(&mut self, dt: f64) -> Result<(), Box<dyn Error>>;
    fn telemetry(&self) -> ImuPacket;
    /// Called when a client goes away.
    fn stop_all(&mut self);
}

/// Serves one client at a time. Time advances by the wall clock between
/// telemetry requests.
pub struct SimulationServer {
    listener: TcpListener,
    idle_timeout: Duration,
}

impl SimulationServer {
    const ACCEPT_POLL: Duration = Duration::from_millis(10);

    pub fn bind(addr: impl ToSocketAddrs, idle_timeout: Duration) -> Result<Self, RelayErrors> {
        if idle_timeout.is_zero() {
            return Err(RelayErrors::InvalidTimeout(idle_timeout));
        }
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            idle_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayErrors> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until `running` is cleared. A failing client is
    /// logged and dropped; the server keeps listening.
    pub fn serve<S: TelemetrySource>(
        &self,
        source: &mut S,
        running: &AtomicBool,
    ) -> Result<(), RelayErrors> {
        log::info!("simulation server listening on {}", self.local_addr()?);
        while running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("client {peer} connected");
                    match self.handle(stream, source, running) {
                        Ok(()) => log::info!("client {peer} disconnected"),
                        Err(e) => log::warn!("client {peer} dropped: {e}"),
                    }
                    source.stop_all();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(Self::ACCEPT_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Runs one client session until it disconnects or `running` is cleared.
    pub fn handle<S: TelemetrySource>(
        &self,
        mut stream: TcpStream,
        source: &mut S,
        running: &AtomicBool,
    ) -> Result<(), RelayErrors> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.idle_timeout))?;
        stream.set_write_timeout(Some(self.idle_timeout))?;
        stream.set_nodelay(true)?;

        let mut last = Instant::now();
        while running.load(Ordering::SeqCst) {
            let bytes = match read_frame(&mut stream) {
                Ok(bytes) => bytes,
                Err(RelayErrors::Closed) => return Ok(()),
                Err(e) => return Err(e),
            };
            match Packet::decode(&bytes)? {
                Packet::Command(c) => source
                    .set_command(c.index as usize, c.command)
                    .map_err(|e| RelayErrors::Source(e.to_string()))?,
                Packet::RequestTelemetry => {
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64();
                    last = now;
                    if dt > 0.0 {
                        source
                            .advance(dt)
                            .map_err(|e| RelayErrors::Source(e.to_string()))?;
                    }
                    let reply = Packet::Imu(source.telemetry());
                    write_frame(&mut stream, &reply.encode())?;
                }
                other => return Err(RelayErrors::UnexpectedPacket("command or request", other.tag())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RemoteImu, RemoteThruster, SimulationClient, UpdateSimClient};
    use hardware::{ActuatorSink, Measurement, SensorSnapshot, SensorSource};
    use mission::Subtask;
    use nalgebra::Vector3;
    use rotations::prelude::UnitQuaternion;
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    /// Reports how many commands it has seen and how long it has run.
    struct Recorder {
        commands: Arc<Mutex<Vec<(usize, f64)>>>,
        time: f64,
        stopped: Arc<AtomicBool>,
    }

    impl TelemetrySource for Recorder {
        fn set_command(&mut self, index: usize, command: f64) -> Result<(), Box<dyn Error>> {
            if index > 3 {
                return Err(format!("no thruster {index}").into());
            }
            self.commands.lock().map_err(|e| e.to_string())?.push((index, command));
            Ok(())
        }

        fn advance(&mut self, dt: f64) -> Result<(), Box<dyn Error>> {
            self.time += dt;
            Ok(())
        }

        fn telemetry(&self) -> ImuPacket {
            let count = self.commands.lock().map(|c| c.len()).unwrap_or(0);
            ImuPacket {
                attitude: UnitQuaternion::from_yaw(0.5),
                acceleration: Vector3::new(count as f64, self.time, 0.0),
            }
        }

        fn stop_all(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_loopback_session() {
        let server = SimulationServer::bind("127.0.0.1:0", Duration::from_secs(5)).unwrap();
        let addr = server.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicBool::new(false));

        let handle = {
            let running = running.clone();
            let commands = commands.clone();
            let stopped = stopped.clone();
            thread::spawn(move || {
                let mut source = Recorder {
                    commands,
                    time: 0.0,
                    stopped,
                };
                server.serve(&mut source, &running)
            })
        };

        {
            let client = SimulationClient::connect(addr, Duration::from_secs(5))
                .unwrap()
                .shared();
            let mut t0 = RemoteThruster::new(client.clone(), 0);
            let mut t2 = RemoteThruster::new(client.clone(), 2);
            t0.send(0.25).unwrap();
            t2.send(-0.5).unwrap();
            assert!(t0.send(1.5).is_err());

            let mut update = UpdateSimClient::new(client.clone());
            update.produce(&SensorSnapshot::new(0.0)).unwrap();

            let mut imu = RemoteImu::new(client.clone());
            let Measurement::Imu(reading) = imu.read(Duration::from_millis(10)).unwrap() else {
                panic!("expected an imu measurement");
            };
            assert_eq!(reading.acceleration[0], 2.0);
            assert!(reading.acceleration[1] >= 0.0);
            assert!((reading.attitude.yaw() - 0.5).abs() < 1e-12);

            // bad index fails the session on the server side
            let mut bad = RemoteThruster::new(client.clone(), 9);
            bad.send(0.1).unwrap();
            assert!(client.borrow_mut().fetch().is_err());
        }

        assert_eq!(*commands.lock().unwrap(), vec![(0, 0.25), (2, -0.5)]);
        // wait for the server to notice the session ended
        let start = Instant::now();
        while !stopped.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(stopped.load(Ordering::SeqCst));

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap().unwrap();
    }

    /// Counts telemetry requests; the first one takes longer than a client
    /// is willing to wait.
    struct StallsOnce {
        requests: usize,
        stall: Duration,
    }

    impl TelemetrySource for StallsOnce {
        fn set_command(&mut self, _index: usize, _command: f64) -> Result<(), Box<dyn Error>> {
            Ok(())
        }

        fn advance(&mut self, _dt: f64) -> Result<(), Box<dyn Error>> {
            self.requests += 1;
            if self.requests == 1 {
                thread::sleep(self.stall);
            }
            Ok(())
        }

        fn telemetry(&self) -> ImuPacket {
            ImuPacket {
                attitude: UnitQuaternion::IDENTITY,
                acceleration: Vector3::new(self.requests as f64, 0.0, 0.0),
            }
        }

        fn stop_all(&mut self) {}
    }

    #[test]
    fn test_late_reply_never_answers_next_fetch() {
        let server = SimulationServer::bind("127.0.0.1:0", Duration::from_secs(5)).unwrap();
        let addr = server.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = running.clone();
            thread::spawn(move || {
                let mut source = StallsOnce {
                    requests: 0,
                    stall: Duration::from_millis(400),
                };
                server.serve(&mut source, &running)
            })
        };

        let client = SimulationClient::connect(addr, Duration::from_millis(100))
            .unwrap()
            .shared();
        let mut imu = RemoteImu::new(client.clone());
        assert!(client.borrow_mut().fetch().is_err());
        assert!(!client.borrow().is_connected());
        // the reply to the first request is still in flight
        assert!(matches!(
            client.borrow_mut().fetch(),
            Err(RelayErrors::Disconnected)
        ));
        assert!(matches!(
            client.borrow_mut().set(0, 0.1),
            Err(RelayErrors::Disconnected)
        ));
        assert!(imu.read(Duration::from_millis(10)).is_err());
        let mut thruster = RemoteThruster::new(client.clone(), 0);
        assert!(thruster.send(0.2).is_err());
        thruster.send(0.0).unwrap();

        thread::sleep(Duration::from_millis(600));
        client.borrow_mut().reconnect().unwrap();
        let fresh = client.borrow_mut().fetch().unwrap();
        assert_eq!(fresh.acceleration[0], 2.0);
        let Measurement::Imu(reading) = imu.read(Duration::from_millis(10)).unwrap() else {
            panic!("expected an imu measurement");
        };
        assert_eq!(reading.acceleration[0], 2.0);
        drop((imu, thruster));
        drop(client);

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            SimulationServer::bind("127.0.0.1:0", Duration::ZERO),
            Err(RelayErrors::InvalidTimeout(_))
        ));
    }
}
