//! trackaudit cli - GPS track quality analysis

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use argopt::{cmd_group, subcmd};
use csv::ReaderBuilder;
use log::info;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use tracing_subscriber::EnvFilter;

use trackaudit::report::gpx::{GpxGenerator, Tracker};
use trackaudit::report::{
    render_anomalies, render_groups, render_segments, render_summary, write_gpx, GroupRow,
    SegmentRow,
};
use trackaudit::sources::{parse_timestamp, CsvSource, JsonSource};
use trackaudit::{
    analyze_segments, detect_anomalies, generate_summary, group_consecutive_anomalies,
    DetectionProfile, FieldsConfiguration, ProfileOverrides, SourceToDevices, TrackPoint,
};

/// CLI of trackaudit - Find anomalies and quality issues in raw GPS tracks
#[cmd_group(commands = [anomalies, segments, gpx])]
fn main() -> Result<(), String> {}

/// List the anomalies of a track
#[subcmd]
fn anomalies(
    /// Track file, JSON backend response or CSV
    input: String,
    /// Use the raw device track thresholds instead of the mileage ones
    #[opt(long)]
    raw: bool,
    /// Merge consecutive anomalies of the same type
    #[opt(long)]
    grouped: bool,
    /// Print JSON instead of a table
    #[opt(long)]
    json: bool,
    /// Device to analyze. Default: every device of the file
    #[opt(long)]
    device: Option<String>,
    /// Start time, eg.: 2024-05-24T08:00:00
    #[opt(long)]
    from: Option<String>,
    /// End time, eg.: 2024-05-24T18:00:00
    #[opt(long)]
    to: Option<String>,
    /// Fields and profiles configuration. Default: .trackaudit.yaml, ~/.trackaudit.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let configs = load_configs(config);
    let profile = detection_profile(raw, &configs)?;

    let tracks = load_tracks(&input, device, from, to, configs.fields)?;

    for (device, points) in tracks {
        let found = detect_anomalies(&points, &profile);
        info!("{} anomalies in the track of {}", found.len(), device);

        if grouped {
            let groups = group_consecutive_anomalies(found);
            if json {
                let rows: Vec<GroupRow> = groups.iter().map(GroupRow::from).collect();
                print_json(&device, &rows)?;
            } else {
                println!("{}", device);
                print!("{}", render_groups(&groups));
            }
        } else if json {
            print_json(&device, &found)?;
        } else {
            println!("{}", device);
            print!("{}", render_anomalies(&found));
        }
    }

    Ok(())
}

/// Split a track into issue segments
#[subcmd]
fn segments(
    /// Track file, JSON backend response or CSV
    input: String,
    /// Print the time spent under each issue instead of the segments
    #[opt(long)]
    summary: bool,
    /// Print JSON instead of a table
    #[opt(long)]
    json: bool,
    /// Device to analyze. Default: every device of the file
    #[opt(long)]
    device: Option<String>,
    /// Start time, eg.: 2024-05-24T08:00:00
    #[opt(long)]
    from: Option<String>,
    /// End time, eg.: 2024-05-24T18:00:00
    #[opt(long)]
    to: Option<String>,
    /// Fields and profiles configuration. Default: .trackaudit.yaml, ~/.trackaudit.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let configs = load_configs(config);
    let tracks = load_tracks(&input, device, from, to, configs.fields)?;

    for (device, points) in tracks {
        let found = analyze_segments(&points);

        if summary {
            let totals = generate_summary(&found);
            if json {
                print_json(&device, &totals)?;
            } else {
                println!("{}", device);
                print!("{}", render_summary(&totals));
            }
        } else if json {
            let rows: Vec<SegmentRow> = found.iter().map(SegmentRow::from).collect();
            print_json(&device, &rows)?;
        } else {
            println!("{}", device);
            print!("{}", render_segments(&found));
        }
    }

    Ok(())
}

/// Generate a GPX with one track per issue segment and one waypoint per anomaly group
#[subcmd]
fn gpx(
    /// Track file, JSON backend response or CSV
    input: String,
    /// GPX path file destination
    destination: String,
    /// Use the raw device track thresholds instead of the mileage ones
    #[opt(long)]
    raw: bool,
    /// Device to export. Default: every device of the file
    #[opt(long)]
    device: Option<String>,
    /// Start time, eg.: 2024-05-24T08:00:00
    #[opt(long)]
    from: Option<String>,
    /// End time, eg.: 2024-05-24T18:00:00
    #[opt(long)]
    to: Option<String>,
    /// Fields and profiles configuration. Default: .trackaudit.yaml, ~/.trackaudit.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let configs = load_configs(config);
    let profile = detection_profile(raw, &configs)?;
    let source = if raw { "raw device track" } else { "mileage track" };

    let tracks = load_tracks(&input, device, from, to, configs.fields)?;

    let destination = File::create(destination)
        .map_err(|e| format!("Failed on create the destination file: {}", e))?;

    let mut gpx = GpxGenerator::empty();
    for (device, points) in tracks {
        let mut tracker = Tracker::new(device);
        tracker.source(source.to_string());

        let groups = group_consecutive_anomalies(detect_anomalies(&points, &profile));

        gpx.tracks.extend(tracker.tracks(&analyze_segments(&points)));
        gpx.waypoints.extend(tracker.waypoints(&groups));
    }

    let doc = gpx.generate();

    let writer = BufWriter::new(destination);
    write_gpx(&doc, writer).map_err(|e| e.to_string())?;

    Ok(())
}

/// Thresholds of the selected profile with the configured overrides
fn detection_profile(raw: bool, configs: &Configs) -> Result<DetectionProfile, String> {
    let profile = if raw {
        DetectionProfile::raw_track().with_overrides(&configs.profiles.raw_track)
    } else {
        DetectionProfile::mileage().with_overrides(&configs.profiles.mileage)
    };

    profile.map_err(|e| format!("Invalid profile configuration: {}", e))
}

/// Log to stderr, filtered by `RUST_LOG`
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Read the input file and split it by device
///
/// `.json` files hold a single device track, named by `device` or the file
/// name; anything else is read as CSV.
fn load_tracks(
    input: &str,
    device: Option<String>,
    from: Option<String>,
    to: Option<String>,
    fields: FieldsConfiguration,
) -> Result<Vec<(String, Vec<TrackPoint>)>, String> {
    let start = match from {
        Some(raw) => parse_timestamp(&raw)
            .map_err(|e| format!("Failed on parse the start time: {}", e))?,
        None => PrimitiveDateTime::MIN,
    };
    let end = match to {
        Some(raw) => {
            parse_timestamp(&raw).map_err(|e| format!("Failed on parse the end time: {}", e))?
        }
        None => PrimitiveDateTime::MAX,
    };

    let path = Path::new(input);
    let file = File::open(path).map_err(|e| format!("Failed on open the track file: {}", e))?;

    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    let devices = if is_json {
        let device_id = device.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "device".to_string())
        });

        let source = JsonSource::new(BufReader::new(file), device_id, Some(fields));
        SourceToDevices::build(source, start, end)
    } else {
        let rdr = ReaderBuilder::new().flexible(true).from_reader(file);
        let default_device = device.clone().unwrap_or_else(|| "device".to_string());

        let source = CsvSource::new(rdr, Some(fields), default_device);
        SourceToDevices::build(source, start, end)
    }
    .map_err(|e| e.to_string())?;

    let tracks: Vec<(String, Vec<TrackPoint>)> = devices
        .into_iter()
        .filter(|(id, _)| device.as_ref().map_or(true, |d| d == id))
        .collect();

    if tracks.is_empty() {
        return Err("No track points found".to_string());
    }

    Ok(tracks)
}

fn print_json<T: Serialize + ?Sized>(device: &str, value: &T) -> Result<(), String> {
    #[derive(Serialize)]
    struct DeviceReport<'a, T: Serialize + ?Sized> {
        device: &'a str,
        report: &'a T,
    }

    let out = serde_json::to_string_pretty(&DeviceReport {
        device,
        report: value,
    })
    .map_err(|e| e.to_string())?;
    println!("{}", out);

    Ok(())
}

/// Load the current config
fn load_configs(provided: Option<String>) -> Configs {
    let mut options = vec![];

    if let Some(sprovided) = provided {
        options.push(sprovided);
    }

    options.push(".trackaudit.yaml".to_string());

    if let Some(home) = dirs::home_dir() {
        if let Some(shome) = home.to_str() {
            options.push(format!("{}/.trackaudit.yaml", shome));
        }
    }

    let mut yaml: Option<String> = None;
    for fi in options {
        if let Ok(s) = fs::read_to_string(fi) {
            yaml = Some(s);
            break;
        }
    }

    if let Some(s) = yaml {
        match serde_yaml::from_str::<Configs>(&s) {
            Ok(conf) => return conf,
            Err(e) => log::warn!("Ignoring the config file: {}", e),
        }
    }

    Configs::default()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct Configs {
    pub fields: FieldsConfiguration,
    pub profiles: ProfilesConfiguration,
}

/// Threshold overrides of each detection profile
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct ProfilesConfiguration {
    pub mileage: ProfileOverrides,
    pub raw_track: ProfileOverrides,
}

#[test]
fn parse_configs() -> Result<(), String> {
    let yaml = "fields: {}\nprofiles: {}";

    let conf: Configs = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;

    assert_eq!(Configs::default(), conf);
    assert_eq!("wdate", conf.fields.time);

    let yaml = "
fields:
  device_id: imei
  time: recorded_at
profiles:
  mileage:
    max_gap_minutes: 15
  raw_track:
    max_speed_kph: 180.0
    bounds:
      min_lat: 40.0
      max_lat: 60.0
      min_lon: 10.0
      max_lon: 50.0";

    let conf: Configs = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;

    assert_eq!(
        FieldsConfiguration {
            device_id: "imei".to_string(),
            time: "recorded_at".to_string(),
            ..Default::default()
        },
        conf.fields
    );
    assert_eq!(Some(15), conf.profiles.mileage.max_gap_minutes);
    assert_eq!(None, conf.profiles.mileage.max_speed_kph);

    let raw = detection_profile(true, &conf)?;
    assert_eq!(180.0, raw.max_speed_kph);
    assert_eq!(40.0, raw.bounds.min_lat);
    assert_eq!(1200.0, raw.jump_distance_m);

    Ok(())
}

#[test]
fn rejected_profile_configs() -> Result<(), String> {
    let yaml = "profiles:\n  mileage:\n    max_gap_minutes: 9223372036854775807";
    assert!(serde_yaml::from_str::<Configs>(yaml).is_err());

    let yaml = "profiles:\n  mileage:\n    max_speed_kph: -1.0";
    let conf: Configs = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;

    let err = detection_profile(false, &conf).unwrap_err();
    assert_eq!(
        "Invalid profile configuration: Invalid max_speed_kph: `-1`",
        err
    );
    assert!(detection_profile(true, &conf).is_ok());

    Ok(())
}
