use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs;
use std::io::{BufWriter, Read, Seek};
use std::path::Path;

use crate::waveform::Waveform;

/// Load 16-bit PCM WAV audio from a reader.
///
/// Samples are normalized from i16 PCM to `f32` in `[-1.0, 1.0]` and kept interleaved.
pub fn read_wav<R>(reader: R) -> Result<Waveform>
where
    R: Read + Seek,
{
    let mut reader = WavReader::new(reader).context("failed to read WAV data from reader")?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        anyhow::bail!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    let mut samples = Vec::new();
    for sample in reader.samples::<i16>() {
        let pcm = sample?;
        samples.push(pcm as f32 / i16::MAX as f32);
    }

    Waveform::new(spec.sample_rate, spec.channels, samples)
}

/// Write a waveform as 16-bit PCM WAV.
///
/// The file is written next to `path` and renamed into place, so a crash never leaves a
/// half-written artifact at the final path (the artifact's existence is what makes reruns skip).
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("failed to create dir: {}", dir.display()))?;

    let spec = WavSpec {
        channels: waveform.channels(),
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file_mut()), spec)
            .context("failed to start WAV writer")?;
        for s in waveform.samples() {
            let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(pcm)?;
        }
        writer.finalize().context("failed to finalize WAV")?;
    }

    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("failed to move into place: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_file_reads_back_with_same_format() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("out.wav");
        let w = Waveform::new(32_000, 2, vec![0.0, 0.5, -0.5, 1.0, 0.25, -1.0])?;

        write_wav(&path, &w)?;
        let back = read_wav(fs::File::open(&path)?)?;

        assert_eq!(back.sample_rate(), 32_000);
        assert_eq!(back.channels(), 2);
        assert_eq!(back.frames(), 3);
        for (a, b) in w.samples().iter().zip(back.samples()) {
            assert!((a - b).abs() < 1e-3);
        }
        Ok(())
    }

    #[test]
    fn rejects_float_wav() -> anyhow::Result<()> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let spec = WavSpec {
                channels: 1,
                sample_rate: 8000,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            };
            let mut writer = WavWriter::new(&mut buf, spec)?;
            writer.write_sample(0.5f32)?;
            writer.finalize()?;
        }
        buf.set_position(0);
        let err = read_wav(buf).unwrap_err();
        assert!(err.to_string().contains("16-bit"));
        Ok(())
    }
}
