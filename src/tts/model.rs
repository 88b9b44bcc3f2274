use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SpeechModelSettings;
use crate::signal::{read_wav_bytes, resample_linear};
use crate::text::TextTokenizer;

/// Longest token sequence the acoustic model accepts in one call.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 600;

/// Acoustic model and vocoder behind one call: tokens plus speaker in, waveform out.
pub trait SpeechModel: Send + Sync {
    fn name(&self) -> &str;

    /// Rate of the waveforms returned by [`SpeechModel::generate`].
    fn sample_rate(&self) -> u32;

    fn max_input_tokens(&self) -> usize {
        DEFAULT_MAX_INPUT_TOKENS
    }

    fn generate(&self, token_ids: &[u32], speaker: &[f32]) -> Result<Vec<f32>, String>;
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    token_ids: &'a [u32],
    text: String,
    speaker_embedding: &'a [f32],
    sample_rate: u32,
}

#[derive(Deserialize)]
struct CommandResponse {
    success: bool,
    #[serde(default)]
    audio_base64: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Runs an external synthesis process once per chunk.
///
/// The request goes to stdin as one JSON object; stdout must hold one JSON
/// object whose `audio_base64` field is a complete WAV file.
pub struct CommandSpeechModel {
    command: PathBuf,
    args: Vec<String>,
    sample_rate: u32,
    tokenizer: Arc<dyn TextTokenizer>,
}

impl CommandSpeechModel {
    pub fn new(
        command: PathBuf,
        args: Vec<String>,
        sample_rate: u32,
        tokenizer: Arc<dyn TextTokenizer>,
    ) -> Self {
        Self {
            command,
            args,
            sample_rate: sample_rate.max(1),
            tokenizer,
        }
    }

    /// `None` when no command is configured.
    pub fn from_settings(
        settings: &SpeechModelSettings,
        tokenizer: Arc<dyn TextTokenizer>,
    ) -> Option<Self> {
        let command = settings.command.clone()?;
        Some(Self::new(command, settings.args.clone(), settings.sample_rate, tokenizer))
    }

    fn run(&self, payload: &[u8]) -> Result<Vec<u8>, String> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| format!("Failed to start {}: {err}", self.command.display()))?;
        send_request(&mut child, payload)?;
        let output = child
            .wait_with_output()
            .map_err(|err| format!("Synthesis process failed: {err}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "Synthesis process exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        Ok(output.stdout)
    }
}

/// Write `payload` to the child's stdin; on failure the child is killed and reaped.
fn send_request(child: &mut Child, payload: &[u8]) -> Result<(), String> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    if let Err(err) = stdin.write_all(payload) {
        drop(stdin);
        let _ = child.kill();
        let _ = child.wait();
        return Err(format!("Failed to send request: {err}"));
    }
    Ok(())
}

impl SpeechModel for CommandSpeechModel {
    fn name(&self) -> &str {
        "command"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn generate(&self, token_ids: &[u32], speaker: &[f32]) -> Result<Vec<f32>, String> {
        let request = CommandRequest {
            token_ids,
            text: self.tokenizer.decode(token_ids),
            speaker_embedding: speaker,
            sample_rate: self.sample_rate,
        };
        let payload = serde_json::to_vec(&request).map_err(|err| err.to_string())?;
        let stdout = self.run(&payload)?;
        let response: CommandResponse = serde_json::from_slice(&stdout)
            .map_err(|err| format!("Invalid synthesis response: {err}"))?;
        if !response.success {
            return Err(response
                .error
                .unwrap_or_else(|| "synthesis process reported failure".to_string()));
        }
        let encoded = response
            .audio_base64
            .ok_or_else(|| "response carries no audio".to_string())?;
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|err| format!("Invalid audio encoding: {err}"))?;
        let audio = read_wav_bytes(&bytes)?;
        debug!(
            "Synthesis process returned {} samples at {} Hz",
            audio.samples.len(),
            audio.sample_rate
        );
        Ok(resample_linear(&audio.samples, audio.sample_rate, self.sample_rate))
    }
}
