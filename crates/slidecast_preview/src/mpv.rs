use crate::error::{PreviewError, Result};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Native volume ceiling of the player, in percent.
const NATIVE_MAX: f64 = 100.0;

/// Ceiling engaged by the amplifier, allowing gains up to 2x.
const AMPLIFIED_MAX: f64 = 200.0;

/// One mpv instance controlled over its JSON IPC socket. Used as the media
/// element of the live preview: one instance for slide visuals, one per
/// audio role.
pub struct MpvPlayer {
    process: Option<Child>,
    socket_path: PathBuf,
    amplified: bool,
}

impl MpvPlayer {
    /// Spawn an idle player. `video` controls whether a video surface is
    /// created; audio roles run with `--no-video`.
    pub fn spawn(label: &str, video: bool) -> Result<Self> {
        let socket_path = std::env::temp_dir().join(format!(
            "slidecast-mpv-{label}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&socket_path);

        let mut args = vec![
            "--idle=yes".to_string(),
            "--keep-open=yes".to_string(),
            "--osc=no".to_string(),
            "--osd-level=0".to_string(),
            format!("--input-ipc-server={}", socket_path.display()),
        ];
        if !video {
            args.push("--no-video".to_string());
            args.push("--force-window=no".to_string());
        }

        let child = Command::new("mpv")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PreviewError::MpvNotFound
                } else {
                    PreviewError::Io(e)
                }
            })?;

        let mut player = Self {
            process: Some(child),
            socket_path,
            amplified: false,
        };

        // Wait for the IPC socket.
        for _ in 0..50 {
            if player.socket_path.exists() {
                return Ok(player);
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
        player.stop();
        Err(PreviewError::SocketUnavailable)
    }

    fn send_command(&self, command: serde_json::Value) -> Result<serde_json::Value> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| PreviewError::Ipc(format!("connect failed: {e}")))?;
        stream
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .ok();

        let msg = format!("{command}\n");
        stream
            .write_all(msg.as_bytes())
            .map_err(|e| PreviewError::Ipc(format!("write failed: {e}")))?;

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        reader
            .read_line(&mut response)
            .map_err(|e| PreviewError::Ipc(format!("read failed: {e}")))?;

        serde_json::from_str(&response).map_err(|e| PreviewError::Ipc(format!("parse failed: {e}")))
    }

    pub fn load(&self, location: &str) -> Result<()> {
        self.send_command(json!({ "command": ["loadfile", location, "replace"] }))?;
        Ok(())
    }

    /// Stop playback and clear the playlist; the player stays idle.
    pub fn halt(&self) -> Result<()> {
        self.send_command(json!({ "command": ["stop"] }))?;
        Ok(())
    }

    pub fn set_loop(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "inf" } else { "no" };
        self.send_command(json!({ "command": ["set_property", "loop-file", value] }))?;
        Ok(())
    }

    /// Apply a linear gain (1.0 = unity). Below unity the native volume
    /// control is used directly; the first gain above unity transparently
    /// raises the player's volume ceiling, which then stays engaged for the
    /// rest of the session.
    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        let percent = volume_percent(gain);
        if percent > NATIVE_MAX && !self.amplified {
            self.send_command(
                json!({ "command": ["set_property", "volume-max", AMPLIFIED_MAX] }),
            )?;
            self.amplified = true;
        }
        self.send_command(json!({ "command": ["set_property", "volume", percent] }))?;
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.send_command(json!({ "command": ["set_property", "pause", true] }))?;
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.send_command(json!({ "command": ["set_property", "pause", false] }))?;
        Ok(())
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send_command(json!({ "command": ["seek", seconds, "absolute"] }))?;
        Ok(())
    }

    pub fn position(&self) -> Result<f64> {
        let resp = self.send_command(json!({ "command": ["get_property", "time-pos"] }))?;
        resp.get("data")
            .and_then(|d| d.as_f64())
            .ok_or_else(|| PreviewError::Ipc("no position data".into()))
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a linear gain onto the mpv volume property, clamped to the amplified
/// ceiling.
pub fn volume_percent(gain: f64) -> f64 {
    (gain.clamp(0.0, 2.0)) * 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_percent_maps_and_clamps() {
        assert_eq!(volume_percent(0.0), 0.0);
        assert_eq!(volume_percent(0.5), 50.0);
        assert_eq!(volume_percent(1.0), 100.0);
        assert_eq!(volume_percent(1.5), 150.0);
        assert_eq!(volume_percent(2.0), 200.0);
        assert_eq!(volume_percent(5.0), 200.0);
        assert_eq!(volume_percent(-1.0), 0.0);
    }

    #[test]
    fn spawn_set_gain_and_stop() {
        // Skip if mpv is not available.
        let mpv_available = Command::new("mpv")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !mpv_available {
            eprintln!("Skipping mpv test: mpv not available");
            return;
        }

        let mut player = MpvPlayer::spawn("test-audio", false).unwrap();
        assert!(player.is_running());

        // Below unity: native volume only.
        player.set_gain(0.5).unwrap();
        assert!(!player.amplified);

        // Above unity: amplifier engages and stays engaged.
        player.set_gain(1.5).unwrap();
        assert!(player.amplified);
        player.set_gain(0.5).unwrap();
        assert!(player.amplified);

        player.stop();
        assert!(!player.is_running());
    }
}
