//! Pose estimation visualization handler
//!
//! Builds a pose estimation figure from an NWB file by running an external
//! visualization tool, which uploads the figure and prints its URL. Loading
//! large remote NWB files can block for minutes, so the tool runs on the
//! blocking pool inside a heartbeat scope.

use async_trait::async_trait;
use runpack_core::domain::heartbeat::Heartbeat;
use serde_json::{Map, Value as JsonValue, json};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ConsoleLog, HandlerError, HandlerOutput, HeartbeatReporter, HeartbeatSink, JobHandler};

pub const JOB_TYPE: &str = "figpack_nwb_pose_estimation";

const FIGURE_TITLE: &str = "RUNPACK: Pose Estimation from NWB";

/// Validated job input
#[derive(Debug, Clone, PartialEq)]
struct PoseEstimationParams {
    nwb_url: String,
    path: String,
    dandiset_id: String,
    neurosift_url: String,
}

impl PoseEstimationParams {
    fn parse(params: &Map<String, JsonValue>) -> Result<Self, HandlerError> {
        let nwb_url = required_string(params, "nwb_url")?;
        let path = required_string(params, "path")?;
        let dandiset_id = optional_string(params, "dandiset_id")?;
        let neurosift_url = optional_string(params, "neurosift_url")?;

        if !is_http_url(&nwb_url) {
            return Err(HandlerError::invalid(format!(
                "Parameter 'nwb_url' must be a valid HTTP/HTTPS URL, got: {}",
                nwb_url
            )));
        }

        if !path.starts_with('/') {
            return Err(HandlerError::invalid(format!(
                "Parameter 'path' must start with '/', got: {}",
                path
            )));
        }

        Ok(Self {
            nwb_url,
            path,
            dandiset_id,
            neurosift_url,
        })
    }

    fn description(&self) -> String {
        json!({
            "dandiset_id": self.dandiset_id,
            "neurosift_url": self.neurosift_url,
            "nwb_url": self.nwb_url,
            "path": self.path,
        })
        .to_string()
    }
}

fn required_string(params: &Map<String, JsonValue>, key: &str) -> Result<String, HandlerError> {
    match params.get(key) {
        None => Err(HandlerError::invalid(format!(
            "Missing required parameter: '{}'",
            key
        ))),
        Some(JsonValue::String(value)) => Ok(value.clone()),
        Some(other) => Err(HandlerError::invalid(format!(
            "Parameter '{}' must be a string, got {}",
            key,
            json_type_name(other)
        ))),
    }
}

fn optional_string(params: &Map<String, JsonValue>, key: &str) -> Result<String, HandlerError> {
    match params.get(key) {
        None | Some(JsonValue::Null) => Ok(String::new()),
        Some(JsonValue::String(value)) => Ok(value.clone()),
        Some(other) => Err(HandlerError::invalid(format!(
            "Parameter '{}' must be a string, got {}",
            key,
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Program and arguments for one tool run
#[derive(Debug, Clone)]
struct Invocation {
    program: String,
    args: Vec<String>,
}

/// Handler for `figpack_nwb_pose_estimation` jobs
pub struct PoseEstimationHandler {
    /// Tool command line; extra words become leading arguments
    command: String,
    heartbeat_interval: Duration,
}

impl PoseEstimationHandler {
    pub fn new(command: impl Into<String>, heartbeat_interval: Duration) -> Self {
        Self {
            command: command.into(),
            heartbeat_interval,
        }
    }

    fn invocation(&self, params: &PoseEstimationParams) -> Result<Invocation, HandlerError> {
        let mut words = self.command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| HandlerError::execution("Pose estimation command is empty"))?;

        let mut args: Vec<String> = words.collect();
        args.extend([
            "--nwb-url".to_string(),
            params.nwb_url.clone(),
            "--path".to_string(),
            params.path.clone(),
            "--title".to_string(),
            FIGURE_TITLE.to_string(),
            "--description".to_string(),
            params.description(),
        ]);

        Ok(Invocation { program, args })
    }
}

#[async_trait]
impl JobHandler for PoseEstimationHandler {
    async fn execute(
        &self,
        params: Map<String, JsonValue>,
        heartbeat: Arc<dyn HeartbeatSink>,
    ) -> Result<HandlerOutput, HandlerError> {
        let params = PoseEstimationParams::parse(&params)?;
        let invocation = self.invocation(&params)?;

        let console = ConsoleLog::new();
        let reporter =
            HeartbeatReporter::new(Arc::clone(&heartbeat), console.clone(), self.heartbeat_interval);

        console.log(format!("Loading NWB file from: {}", params.nwb_url));
        console.log(format!("Pose estimation path: {}", params.path));
        console.log("This may take several minutes for large files...");

        let task_console = console.clone();
        let result = reporter
            .scope(async move {
                match tokio::task::spawn_blocking(move || {
                    run_visualization(&invocation, &task_console)
                })
                .await
                {
                    Ok(result) => result,
                    Err(e) => Err(HandlerError::execution(format!(
                        "Visualization task failed: {}",
                        e
                    ))),
                }
            })
            .await;

        let figpack_url = match result {
            Ok(url) => url,
            Err(e) => {
                console.log(format!("Failed: {}", e));
                return Err(e);
            }
        };

        console.log(format!("Successfully uploaded! URL: {}", figpack_url));
        console.log("Completed!");
        info!("Pose estimation figure available at {}", figpack_url);

        let console_output = console.snapshot();
        heartbeat
            .beat(Heartbeat::with_progress(100, 100, console_output.clone()))
            .await;

        let mut output_data = Map::new();
        output_data.insert("figpack_url".to_string(), json!(figpack_url));
        output_data.insert("nwb_url".to_string(), json!(params.nwb_url));
        output_data.insert("dandiset_id".to_string(), json!(params.dandiset_id));
        output_data.insert("neurosift_url".to_string(), json!(params.neurosift_url));
        output_data.insert("path".to_string(), json!(params.path));

        Ok(HandlerOutput {
            output_data,
            console_output,
        })
    }
}

/// Runs the tool to completion, streaming its output into the console
///
/// Returns the last stdout line that is an http(s) URL.
fn run_visualization(invocation: &Invocation, console: &ConsoleLog) -> Result<String, HandlerError> {
    debug!("Running {} {:?}", invocation.program, invocation.args);

    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            HandlerError::execution(format!(
                "Failed to start '{}': {}",
                invocation.program, e
            ))
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let figure_url = std::thread::scope(|scope| {
        if let Some(stderr) = stderr {
            scope.spawn(move || read_lines(stderr, |line| console.log(line)));
        }

        let mut figure_url = None;
        if let Some(stdout) = stdout {
            read_lines(stdout, |line| {
                let trimmed = line.trim();
                if is_http_url(trimmed) {
                    figure_url = Some(trimmed.to_string());
                }
                console.log(&line);
            });
        }
        figure_url
    });

    let status = child.wait().map_err(|e| {
        HandlerError::execution(format!("Failed to wait for '{}': {}", invocation.program, e))
    })?;

    if !status.success() {
        return Err(HandlerError::execution(format!(
            "Failed to create pose estimation view: '{}' exited with {}",
            invocation.program, status
        )));
    }

    figure_url.ok_or_else(|| {
        HandlerError::execution(format!(
            "'{}' finished without printing a figure URL",
            invocation.program
        ))
    })
}

/// Feeds every line of `reader` to `on_line` until end of stream
///
/// Invalid UTF-8 is replaced rather than ending the read, so the pipe is
/// drained for the whole life of the tool.
fn read_lines(reader: impl Read, mut on_line: impl FnMut(String)) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Stopped reading tool output: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        beats: Mutex<Vec<Heartbeat>>,
    }

    #[async_trait]
    impl HeartbeatSink for RecordingSink {
        async fn beat(&self, heartbeat: Heartbeat) {
            self.beats.lock().unwrap().push(heartbeat);
        }
    }

    fn params(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    fn valid_params() -> Map<String, JsonValue> {
        params(json!({
            "nwb_url": "https://api.dandiarchive.org/x.nwb",
            "path": "/processing/behavior/PoseEstimationLeftCamera",
            "dandiset_id": "000409"
        }))
    }

    #[test]
    fn test_missing_path() {
        let err = PoseEstimationParams::parse(&params(json!({
            "nwb_url": "https://example.org/a.nwb"
        })))
        .unwrap_err();
        assert_eq!(
            err,
            HandlerError::invalid("Missing required parameter: 'path'")
        );
    }

    #[test]
    fn test_parameter_validation() {
        let err = PoseEstimationParams::parse(&params(json!({
            "nwb_url": 7, "path": "/a"
        })))
        .unwrap_err();
        assert_eq!(
            err,
            HandlerError::invalid("Parameter 'nwb_url' must be a string, got number")
        );

        let err = PoseEstimationParams::parse(&params(json!({
            "nwb_url": "ftp://example.org/a.nwb", "path": "/a"
        })))
        .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidParameters(ref m) if m.contains("HTTP/HTTPS")));

        let err = PoseEstimationParams::parse(&params(json!({
            "nwb_url": "https://example.org/a.nwb", "path": "processing"
        })))
        .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidParameters(ref m) if m.contains("start with '/'")));

        let parsed = PoseEstimationParams::parse(&valid_params()).unwrap();
        assert_eq!(parsed.dandiset_id, "000409");
        assert_eq!(parsed.neurosift_url, "");
    }

    #[test]
    fn test_invocation_arguments() {
        let handler = PoseEstimationHandler::new("python -m figpack_pose", Duration::from_secs(30));
        let parsed = PoseEstimationParams::parse(&valid_params()).unwrap();
        let invocation = handler.invocation(&parsed).unwrap();

        assert_eq!(invocation.program, "python");
        assert_eq!(&invocation.args[..2], &["-m", "figpack_pose"]);
        assert!(invocation.args.contains(&"--nwb-url".to_string()));
        let description = invocation.args.last().unwrap();
        let description: JsonValue = serde_json::from_str(description).unwrap();
        assert_eq!(description["dandiset_id"], "000409");
    }

    #[tokio::test]
    async fn test_invalid_params_send_no_heartbeat() {
        let sink = Arc::new(RecordingSink::default());
        let handler = PoseEstimationHandler::new("true", Duration::from_millis(5));

        let err = handler
            .execute(params(json!({"nwb_url": "https://x"})), sink.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::InvalidParameters(_)));
        assert!(sink.beats.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_program_is_execution_error() {
        let sink = Arc::new(RecordingSink::default());
        let handler =
            PoseEstimationHandler::new("runpack-definitely-missing-tool", Duration::from_millis(5));

        let err = handler.execute(valid_params(), sink).await.unwrap_err();
        assert!(matches!(err, HandlerError::Execution(ref m) if m.contains("Failed to start")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_runs() {
        let dir = tempfile::tempdir().unwrap();

        let ok_script = dir.path().join("ok.sh");
        std::fs::write(
            &ok_script,
            "echo \"loading $2\" >&2\nsleep 0.05\necho 'uploading'\necho 'https://figurl.org/f?v=abc'\n",
        )
        .unwrap();

        let sink = Arc::new(RecordingSink::default());
        let handler =
            PoseEstimationHandler::new(format!("sh {}", ok_script.display()), Duration::from_millis(10));
        let output = handler.execute(valid_params(), sink.clone()).await.unwrap();

        assert_eq!(output.output_data["figpack_url"], "https://figurl.org/f?v=abc");
        assert_eq!(output.output_data["dandiset_id"], "000409");
        assert!(output.console_output.contains("loading https://api.dandiarchive.org/x.nwb"));
        assert!(output.console_output.contains("Completed!"));

        let final_beat = sink.beats.lock().unwrap().last().cloned().unwrap();
        assert_eq!(final_beat.progress_current, Some(100));
        assert_eq!(final_beat.console_output, output.console_output);

        let noisy_script = dir.path().join("noisy.sh");
        std::fs::write(
            &noisy_script,
            "printf 'progress \\377\\376 50%%\\n'\n\
             printf 'warn \\377\\n' >&2\n\
             i=0\n\
             while [ $i -lt 5000 ]; do echo \"frame $i\"; i=$((i+1)); done\n\
             echo 'https://figurl.org/f?v=noisy'\n",
        )
        .unwrap();

        let handler = PoseEstimationHandler::new(
            format!("sh {}", noisy_script.display()),
            Duration::from_millis(10),
        );
        let output = handler
            .execute(valid_params(), Arc::new(RecordingSink::default()))
            .await
            .unwrap();
        assert_eq!(output.output_data["figpack_url"], "https://figurl.org/f?v=noisy");
        assert!(output.console_output.contains("progress \u{FFFD}\u{FFFD} 50%"));
        assert!(output.console_output.contains("frame 4999"));

        let failing_script = dir.path().join("fail.sh");
        std::fs::write(&failing_script, "echo 'no such path' >&2\nexit 3\n").unwrap();

        let handler = PoseEstimationHandler::new(
            format!("sh {}", failing_script.display()),
            Duration::from_millis(10),
        );
        let err = handler
            .execute(valid_params(), Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Execution(ref m) if m.contains("exited with")));
    }
}
