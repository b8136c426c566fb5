//! Loopback demo: a toy physics server and a session streaming from it

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use airlink::protocol::physics;
use airlink::{Frame, GridDims, MessageType, Session, SessionConfig, metrics_snapshot};

const DIMS: GridDims = GridDims::new(8, 4, 8);

fn read_body(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
    stream.read_exact(&mut body).ok()?;
    Some(body)
}

/// Fields drifting with each poll: warm air spreading from the actuator column.
fn physics_reply(step: u32) -> Result<Frame, airlink::Error> {
    let cells = DIMS.size3();
    let mut directions = Vec::with_capacity(cells * 3);
    let mut magnitudes = Vec::with_capacity(cells);
    let mut temperatures = Vec::with_capacity(cells);

    for x in 0..DIMS.x {
        for y in 0..DIMS.y {
            for z in 0..DIMS.z {
                let dx = x as f32 - DIMS.x as f32 / 2.0;
                let dz = z as f32 - DIMS.z as f32 / 2.0;
                let distance = (dx * dx + dz * dz).sqrt().max(1.0);
                directions.extend([dx / distance, -0.5, dz / distance]);
                magnitudes.push((1.0 / distance).min(1.0));
                let warmth = (step as f32 * 0.05 / distance).min(0.9);
                temperatures.push(0.3 + warmth * (y as f32 + 1.0) / DIMS.y as f32 * 0.5);
            }
        }
    }

    let mut frame = Frame::tagged(MessageType::RequestPhysicalValue, cells * 4);
    physics::encode_into(&mut frame, &directions, &magnitudes, &temperatures)?;
    Ok(frame)
}

fn serve(listener: &TcpListener) -> Result<(), Box<dyn std::error::Error>> {
    let (mut stream, peer) = listener.accept()?;
    println!("server: client connected from {peer}");

    let mut step = 0;
    while let Some(body) = read_body(&mut stream) {
        let reply = match MessageType::from_u8(body[0]) {
            Some(MessageType::RequestPhysicalValue) => {
                step += 1;
                physics_reply(step)?
            }
            Some(kind) => {
                println!("server: {kind} ({} bytes)", body.len());
                let mut ack = Frame::new();
                ack.push_u8(body[0]);
                ack.push_bytes(b"ok");
                ack
            }
            None => continue,
        };
        stream.write_all(reply.as_bytes())?;
    }
    println!("server: client left after {step} physics polls");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("airlink loopback demo");
    println!("=====================\n");

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let server = thread::spawn(move || {
        if let Err(err) = serve(&listener) {
            eprintln!("server error: {err}");
        }
    });

    let mut session = Session::new(SessionConfig {
        port,
        handshake_pause: Duration::from_millis(100),
        physics_poll_interval: Duration::from_millis(50),
        ..SessionConfig::default()
    });
    session.store_address("127.0.0.1");
    session.initialize(DIMS)?;
    let handle = session.handle();
    let worker = session.connect()?;

    let mut occupancy = vec![false; DIMS.size3()];
    occupancy[DIMS.index(1, 0, 1)] = true;
    handle.update_occupancy(occupancy.clone());
    handle.mark_installed();
    handle.set_vent_speed(3);

    for tick in 0..5 {
        thread::sleep(Duration::from_millis(200));
        occupancy[DIMS.index(2 + tick, 0, 1)] = true;
        handle.update_occupancy(occupancy.clone());

        handle.with_fields(|fields| {
            let mean = fields.temperature.iter().sum::<f32>() / fields.cells().max(1) as f32;
            let peak = fields
                .velocity
                .chunks_exact(3)
                .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
                .fold(0.0f32, f32::max);
            println!(
                "client: state={} mean temperature {mean:.3}, peak speed {peak:.3}",
                handle.state()
            );
        });
    }

    drop(handle);
    drop(session);
    worker
        .join()
        .map_err(|_| "session worker panicked")??;
    server.join().map_err(|_| "server thread panicked")?;

    let metrics = metrics_snapshot();
    println!(
        "\nframes sent {}, received {}, avg round trip {:?} us",
        metrics.sent_frames,
        metrics.received_frames,
        metrics.avg_round_trip_us()
    );
    Ok(())
}
