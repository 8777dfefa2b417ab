//! Shared test utilities
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, header};
use tempfile::TempDir;
use vox_gateway::api::ApiState;
use vox_gateway::pipeline::Engine;
use vox_gateway::voice::samples_to_wav;
use vox_gateway::{
    ChatMessage, ChatModel, Error, Language, Pipeline, Result, SpeechSynthesizer,
    SynthesisError, Transcriber,
};

const BOUNDARY: &str = "vox-test-boundary";

/// A short 16 kHz mono tone
#[must_use]
pub fn wav_fixture() -> Vec<u8> {
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..1600)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 16_000.0).sin() * 0.3)
        .collect();
    samples_to_wav(&samples, 16_000).expect("failed to build wav fixture")
}

/// What the fake transcriber saw during one call
#[derive(Debug, Clone)]
pub struct SeenUpload {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub language: Language,
}

/// Transcriber returning a canned answer and recording its inputs
pub struct FakeTranscriber {
    reply: std::result::Result<String, String>,
    seen: Mutex<Vec<SeenUpload>>,
}

impl FakeTranscriber {
    pub fn hearing(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<SeenUpload> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &Path, language: Language) -> Result<String> {
        let bytes = tokio::fs::read(audio).await?;
        self.seen.lock().unwrap().push(SeenUpload {
            path: audio.to_path_buf(),
            bytes,
            language,
        });
        self.reply.clone().map_err(Error::Stt)
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}

/// Chat model returning a canned reply (or failing) and recording prompts
pub struct FakeChat {
    reply: Option<String>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChat {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| Error::Chat("connection refused".to_string()))
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Behaviour of the fake synthesizer
#[derive(Debug, Clone)]
pub enum SynthMode {
    Audio(Vec<u8>),
    /// Succeeds without producing any bytes
    Silent,
    Exit,
    Empty,
    Timeout,
    Fault,
}

/// Synthesizer following a fixed [`SynthMode`] and recording its texts
pub struct FakeSynthesizer {
    mode: SynthMode,
    texts: Mutex<Vec<String>>,
    outputs: Mutex<Vec<PathBuf>>,
    calls: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn new(mode: SynthMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            texts: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        output: &Path,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        self.outputs.lock().unwrap().push(output.to_path_buf());

        match &self.mode {
            SynthMode::Audio(bytes) => {
                tokio::fs::write(output, bytes).await?;
                Ok(bytes.clone())
            }
            SynthMode::Silent => Ok(Vec::new()),
            SynthMode::Exit => Err(SynthesisError::Exit {
                code: Some(1),
                stderr: "bad voice".to_string(),
            }),
            SynthMode::Empty => Err(SynthesisError::EmptyOutput(output.to_path_buf())),
            SynthMode::Timeout => Err(SynthesisError::Timeout(Duration::from_secs(15))),
            SynthMode::Fault => Err(SynthesisError::Io(std::io::Error::other("broken pipe"))),
        }
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

/// Pipeline built from ready fake engines
pub fn pipeline(
    transcriber: &Arc<FakeTranscriber>,
    chat: &Arc<FakeChat>,
    synthesizer: &Arc<FakeSynthesizer>,
) -> Pipeline {
    Pipeline::new(
        Language::Italian,
        Engine::Ready(transcriber.clone() as Arc<dyn Transcriber>),
        Engine::Ready(chat.clone() as Arc<dyn ChatModel>),
        Engine::Ready(synthesizer.clone() as Arc<dyn SpeechSynthesizer>),
    )
}

/// Router over `pipeline` serving pages from `web_dir`
pub fn router(pipeline: Pipeline, web_dir: &Path) -> axum::Router {
    let state = ApiState {
        web_dir: web_dir.to_path_buf(),
        ..ApiState::new(Arc::new(pipeline))
    };
    vox_gateway::api::router(Arc::new(state))
}

/// `POST /process-audio/` with one file field
pub fn upload(field: &str, audio: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"recording.wav\"\r\n\
         Content-Type: audio/wav\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(audio);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    multipart(body)
}

/// Router over `pipeline` accepting bodies up to `max_upload_bytes`
pub fn limited_router(pipeline: Pipeline, max_upload_bytes: usize) -> axum::Router {
    let state = ApiState {
        max_upload_bytes,
        ..ApiState::new(Arc::new(pipeline))
    };
    vox_gateway::api::router(Arc::new(state))
}

/// `POST /process-audio/` with a single text field and no file
pub fn text_only_form() -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"note\"\r\n\r\n\
         hello\r\n\
         --{BOUNDARY}--\r\n"
    );
    multipart(body.into_bytes())
}

fn multipart(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process-audio/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Decode a JSON response body
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Stand-in executables for piper and whisper.cpp
///
/// All scripts are written once, before any test spawns them, so no
/// process ever inherits a write handle to a script being executed.
pub struct Scripts {
    dir: TempDir,
}

impl Scripts {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Voice model file accepted by the piper stand-ins
    pub fn voice_model(&self) -> PathBuf {
        self.path("voice.onnx")
    }

    /// Model file accepted by the whisper.cpp stand-ins
    pub fn whisper_model(&self) -> PathBuf {
        self.path("ggml-test.bin")
    }

    /// WAV the successful piper stand-in emits
    pub fn wav(&self) -> PathBuf {
        self.path("fixture.wav")
    }
}

#[cfg(unix)]
pub fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::Builder::new()
            .prefix("vox-scripts-")
            .tempdir()
            .expect("failed to create script dir");
        let scripts = Scripts { dir };

        std::fs::write(scripts.voice_model(), b"onnx").unwrap();
        std::fs::write(scripts.whisper_model(), b"ggml").unwrap();
        std::fs::write(scripts.wav(), wav_fixture()).unwrap();

        let parse_output = r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output_file) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
"#;

        let wav = scripts.wav();
        let bodies = [
            (
                "piper-ok",
                format!("{parse_output}cat > /dev/null\ncp '{}' \"$out\"\n", wav.display()),
            ),
            ("piper-echo", format!("{parse_output}cat > \"$out\"\n")),
            (
                "piper-fail",
                "cat > /dev/null\necho 'voice model corrupt' >&2\nexit 3\n".to_string(),
            ),
            ("piper-silent", "cat > /dev/null\nexit 0\n".to_string()),
            ("piper-slow", "exec sleep 5\n".to_string()),
            (
                "whisper-ok",
                r#"lang=""
file=""
while [ $# -gt 0 ]; do
  case "$1" in
    -l) lang="$2"; shift 2 ;;
    -f) file="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -f "$file" ] || exit 2
echo " Ciao,"
echo ""
echo "  lingua $lang  "
"#
                .to_string(),
            ),
            ("whisper-silent", "exit 0\n".to_string()),
            (
                "whisper-fail",
                "echo 'failed to read audio' >&2\nexit 1\n".to_string(),
            ),
        ];

        for (name, body) in bodies {
            let path = scripts.path(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        scripts
    })
}
