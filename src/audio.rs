use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

/// Duration of an audio file in seconds, read from container metadata or,
/// failing that, by summing packet durations. Nothing is decoded.
pub fn probe_duration(path: &Path) -> Result<f64, String> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Failed to open audio file '{}': {e}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("Failed to probe audio format: {e}"))?;

    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "No audio track found in file".to_string())?;

    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate)
        && rate > 0
    {
        return Ok(frames as f64 / rate as f64);
    }

    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|r| symphonia::core::units::TimeBase::new(1, r)))
        .ok_or_else(|| "Audio track has no time base".to_string())?;

    let mut total_ts: u64 = 0;
    loop {
        let packet = match format_reader.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(format!("Error reading packet: {e}")),
        };
        if packet.track_id() == track_id {
            total_ts += packet.dur();
        }
    }

    let time = time_base.calc_time(total_ts);
    let secs = time.seconds as f64 + time.frac;
    if secs <= 0.0 {
        return Err("Audio file has zero duration".to_string());
    }
    Ok(secs)
}
