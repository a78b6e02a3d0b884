use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Result, SubmeterError};

/// A single timed subtitle line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub index: usize,
    /// Start time in milliseconds
    pub start_time: u64,
    /// End time in milliseconds
    pub end_time: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }

    /// Detect the format from the file extension, falling back to the content
    pub fn detect(file_name: &str, content: &str) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            Some("srt") => return Ok(Self::Srt),
            Some("vtt") => return Ok(Self::Vtt),
            _ => {}
        }

        let content = strip_bom(content).trim_start();
        if content.starts_with("WEBVTT") {
            Ok(Self::Vtt)
        } else if content.contains("-->") {
            Ok(Self::Srt)
        } else {
            Err(SubmeterError::Subtitle(format!(
                "Unsupported subtitle format: {}",
                file_name
            )))
        }
    }

    pub fn parse(&self, content: &str) -> Result<Vec<SubtitleEntry>> {
        match self {
            Self::Srt => parse_srt(content),
            Self::Vtt => parse_vtt(content),
        }
    }

    pub fn serialize(&self, entries: &[SubtitleEntry]) -> String {
        match self {
            Self::Srt => serialize_srt(entries),
            Self::Vtt => serialize_vtt(entries),
        }
    }
}

/// Decode an uploaded file, detect its format and parse it into entries
pub fn parse_upload(file_name: &str, bytes: &[u8]) -> Result<(SubtitleFormat, Vec<SubtitleEntry>)> {
    let content = std::str::from_utf8(bytes)
        .map_err(|_| SubmeterError::Subtitle("File is not valid UTF-8 text".to_string()))?;

    let format = SubtitleFormat::detect(file_name, content)?;
    let entries = format.parse(content)?;

    if entries.is_empty() {
        return Err(SubmeterError::Validation(
            "No subtitle entries found in file".to_string(),
        ));
    }

    Ok((format, entries))
}

/// Name of the translated file: `movie.srt` becomes `movie.cs.srt`
pub fn translated_file_name(file_name: &str, target_language: &str, format: SubtitleFormat) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("subtitles");

    format!("{}.{}.{}", stem, target_language, format.extension())
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

fn normalize(content: &str) -> String {
    strip_bom(content).replace("\r\n", "\n").replace('\r', "\n")
}

/// Split into blank-line separated blocks of non-empty lines
fn blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn parse_srt(content: &str) -> Result<Vec<SubtitleEntry>> {
    let content = normalize(content);
    let mut entries = Vec::new();

    for block in blocks(&content) {
        let timing_pos = block
            .iter()
            .position(|line| line.contains("-->"))
            .ok_or_else(|| {
                SubmeterError::Subtitle(format!("Missing timing line in block: {}", block[0]))
            })?;

        let index = match timing_pos {
            0 => entries.len() + 1,
            _ => block[timing_pos - 1].trim().parse().unwrap_or(entries.len() + 1),
        };

        let (start_time, end_time) = parse_timing_line(block[timing_pos])?;
        let text = block[timing_pos + 1..].join("\n");

        entries.push(SubtitleEntry {
            index,
            start_time,
            end_time,
            text,
        });
    }

    Ok(entries)
}

fn parse_vtt(content: &str) -> Result<Vec<SubtitleEntry>> {
    let content = normalize(content);
    let mut block_iter = blocks(&content).into_iter();

    match block_iter.next() {
        Some(header) if header[0].trim_start().starts_with("WEBVTT") => {}
        _ => return Err(SubmeterError::Subtitle("Missing WEBVTT header".to_string())),
    }

    let mut entries = Vec::new();
    for block in block_iter {
        let first = block[0].trim_start();
        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
            continue;
        }

        let Some(timing_pos) = block.iter().position(|line| line.contains("-->")) else {
            continue;
        };

        let (start_time, end_time) = parse_timing_line(block[timing_pos])?;
        let text = block[timing_pos + 1..].join("\n");

        entries.push(SubtitleEntry {
            index: entries.len() + 1,
            start_time,
            end_time,
            text,
        });
    }

    Ok(entries)
}

/// Parse `start --> end [cue settings]`
fn parse_timing_line(line: &str) -> Result<(u64, u64)> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| SubmeterError::Subtitle(format!("Invalid timing line: {}", line)))?;

    let end = rest.split_whitespace().next().unwrap_or_default();

    Ok((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` into milliseconds
fn parse_timestamp(value: &str) -> Result<u64> {
    let invalid = || SubmeterError::Subtitle(format!("Invalid timestamp: {}", value));

    let (clock, millis) = value.split_once([',', '.']).ok_or_else(invalid)?;
    if millis.is_empty() || millis.len() > 3 || !millis.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    // Pad short fractions: "5" means 500ms
    let millis: u64 = format!("{:0<3}", millis).parse().map_err(|_| invalid())?;

    let parts = clock
        .split(':')
        .map(|p| p.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>>>()?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return Err(invalid()),
    };
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1_000 + millis))
        .ok_or_else(invalid)
}

/// Format milliseconds as `HH:MM:SS{sep}mmm`
fn format_timestamp(total_milliseconds: u64, separator: char) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, millis)
}

fn serialize_srt(entries: &[SubtitleEntry]) -> String {
    let mut srt_content = String::new();

    for entry in entries {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            entry.index,
            format_timestamp(entry.start_time, ','),
            format_timestamp(entry.end_time, ','),
            entry.text
        ));
    }

    srt_content
}

fn serialize_vtt(entries: &[SubtitleEntry]) -> String {
    let mut vtt_content = String::from("WEBVTT\n\n");

    for entry in entries {
        vtt_content.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_timestamp(entry.start_time, '.'),
            format_timestamp(entry.end_time, '.'),
            entry.text
        ));
    }

    vtt_content
}
