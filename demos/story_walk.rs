use geosonic::{
    Coordinate, GeoSonicDesc, GeoSonicEngine, GeoSonicEvent, HeadlessAudioPlayer,
    ManualPositionSource, MonitorUpdate, PositionSource, StoryCatalog,
};
use std::time::Duration;

const CATALOG: &str = r#"{
  "stories": [
    {
      "id": "harbor",
      "title": "Harbor Walk",
      "description": "Three stops along the old pier",
      "soundClips": [
        { "id": "gate", "file": "gate.mp3", "latitude": 51.5000, "longitude": -0.1000,
          "radius": 40, "title": "The Gate" },
        { "id": "crane", "file": "crane.mp3", "latitude": 51.5010, "longitude": -0.1000,
          "radius": 40, "title": "The Crane" },
        { "id": "lighthouse", "file": "lighthouse.mp3", "lat": 51.5020, "lng": -0.1000,
          "radius": 60 }
      ]
    }
  ]
}"#;

/// Simulates a listener walking north along the pier and back
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let catalog = StoryCatalog::from_json_str(CATALOG)?;
    let gps = ManualPositionSource::new();
    let player = HeadlessAudioPlayer::new();

    let desc = GeoSonicDesc::new()
        .cooldown(Duration::from_secs(2))
        .exit_buffer_m(10.0);
    let mut engine = GeoSonicEngine::new(desc, catalog, gps.clone(), player.clone())?;

    engine.select_story("harbor")?;
    engine.start_monitoring(Some(Box::new(|update: &MonitorUpdate| {
        if let MonitorUpdate::Triggered(event) = update {
            println!(
                "  >> {} ({:.0} m from center)",
                event.clip.display_name(),
                event.distance_m
            );
        }
    })))?;

    // ~11 m per step
    let start = Coordinate::new(51.4995, -0.1000);
    let steps: Vec<Coordinate> = (0..30)
        .chain((0..30).rev())
        .map(|i| Coordinate::new(start.latitude + i as f64 * 0.0001, start.longitude))
        .collect();

    let walker = {
        let gps = gps.clone();
        std::thread::spawn(move || {
            for (i, position) in steps.into_iter().enumerate() {
                // Tunnel under the crane
                let fix = if (12..14).contains(&i) { None } else { Some(position) };
                gps.push(fix);
                std::thread::sleep(Duration::from_millis(100));
            }
        })
    };

    while !walker.is_finished() {
        engine.pump();
        for event in engine.poll_events() {
            match event {
                GeoSonicEvent::ClipStopped { clip_id } => println!("  << left {}", clip_id),
                GeoSonicEvent::SignalLost => println!("  (signal lost)"),
                GeoSonicEvent::EvaluationError { error } => println!("  ! {}", error),
                _ => {}
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    engine.pump();

    if let Some(position) = gps.last_known() {
        println!("Nearby clips from {}:", position);
        for nearby in engine.nearby_clips(&position) {
            println!(
                "  {:<12} {:>8} {}",
                nearby.clip.display_name(),
                nearby.formatted_distance,
                if nearby.is_in_range { "(in range)" } else { "" }
            );
        }
    }

    println!("Status: {:?}", engine.status());
    engine.cleanup()?;
    println!("Player received {} calls", player.history().len());
    Ok(())
}
