//! Integration tests for cachesync

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::collections::HashMap;
    use std::fs;
    use std::io::{self, BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Blobs {
        stored: HashMap<String, Vec<u8>>,
        puts: Vec<String>,
    }

    /// Blob store speaking the GET/PUT protocol, kept in memory
    struct BlobServer {
        url: String,
        blobs: Arc<Mutex<Blobs>>,
    }

    impl BlobServer {
        fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}/", listener.local_addr().unwrap());
            let blobs = Arc::new(Mutex::new(Blobs::default()));

            let shared = Arc::clone(&blobs);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let blobs = Arc::clone(&shared);
                    thread::spawn(move || {
                        let _ = respond(stream, &blobs);
                    });
                }
            });

            Self { url, blobs }
        }

        /// Every address written, in PUT order
        fn puts(&self) -> Vec<String> {
            self.blobs.lock().unwrap().puts.clone()
        }

        fn blob(&self, address: &str) -> Option<Vec<u8>> {
            self.blobs.lock().unwrap().stored.get(address).cloned()
        }
    }

    fn respond(stream: TcpStream, blobs: &Mutex<Blobs>) -> io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);

        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let address = parts
            .next()
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string();

        let mut length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 || line == "\r\n" {
                break;
            }
            if let Some((key, value)) = line.trim_end().split_once(':') {
                if key.eq_ignore_ascii_case("content-length") {
                    length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0; length];
        reader.read_exact(&mut body)?;

        let (status, answer) = {
            let mut blobs = blobs.lock().unwrap();
            match method.as_str() {
                "PUT" => {
                    blobs.stored.insert(address.clone(), body);
                    blobs.puts.push(address);
                    (201, Vec::new())
                }
                "GET" => match blobs.stored.get(&address) {
                    Some(bytes) => (200, bytes.clone()),
                    None => (404, Vec::new()),
                },
                _ => (405, Vec::new()),
            }
        };

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            answer.len()
        )?;
        stream.write_all(&answer)?;
        stream.flush()
    }

    /// Command isolated from the user's config and environment
    fn cachesync(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("cachesync");
        cmd.env_remove("CACHESYNC_SERVER_URL")
            .env_remove("CACHESYNC_CONFIG")
            .arg("--no-local")
            .arg("--config")
            .arg(temp.path().join("config.toml"));
        cmd
    }

    fn write_state(project: &Path) {
        let caches = project.join("build/jps-caches");
        fs::create_dir_all(&caches).unwrap();

        let app = "$BUILD_DIR$/production/app";
        let state = serde_json::json!({
            "java-production": {
                "app": {"hash": "h1", "relativePath": app},
                "lib": {"hash": "h9", "relativePath": "$BUILD_DIR$/production/lib"},
            },
            "resources-production": {"app": {"hash": "h2", "relativePath": app}},
            "gradle-resources-production": {"app": {"hash": "h3", "relativePath": app}},
            "java-test": {},
            "resources-test": {},
            "gradle-resources-test": {},
        });
        fs::write(caches.join("target_sources_state.json"), state.to_string()).unwrap();
    }

    /// A built project with every bundle's sources in place
    fn write_project(project: &Path) {
        write_state(project);
        fs::write(project.join("git.branch"), "deadbeef\n").unwrap();
        fs::write(project.join("build/jps-caches/data.bin"), b"cache").unwrap();

        for (dir, file) in [
            ("out/production/app", "Main.class"),
            ("out/production/lib", "Lib.class"),
            ("dist", "kotlin.zip"),
            ("buildSrc/build/classes/java", "Plugin.class"),
        ] {
            fs::create_dir_all(project.join(dir)).unwrap();
            fs::write(project.join(dir).join(file), b"bytes").unwrap();
        }
    }

    fn upload(temp: &TempDir, server: &BlobServer) -> Command {
        let mut cmd = cachesync(temp);
        cmd.args(["upload", "--workers", "2", "--server", &server.url])
            .arg("--project")
            .arg(temp.path());
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed blob store"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cachesync"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[upload]"))
            .stdout(predicate::str::contains("history_policy = \"on-success\""));
    }

    #[test]
    fn config_set_then_show() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["config", "set", "remote.server_url", "http://cache.local:8080"])
            .assert()
            .success();

        cachesync(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://cache.local:8080"));
    }

    #[test]
    fn config_set_unknown_key() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["config", "set", "remote.nope", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn upload_without_server() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .arg("upload")
            .arg("--project")
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("No remote server URL configured"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn upload_invalid_server() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["upload", "--server", "ftp://cache.local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid remote server URL"));
    }

    #[test]
    fn upload_missing_commit() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["upload", "--server", "http://127.0.0.1:9"])
            .arg("--project")
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Commit identifier file not found"));
    }

    #[test]
    fn upload_unknown_bundle() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["upload", "--bundle", "everything"])
            .assert()
            .failure();
    }

    #[test]
    fn outputs_plain() {
        let temp = TempDir::new().unwrap();
        write_state(temp.path());

        cachesync(&temp)
            .args(["outputs", "-f", "plain", "--project"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("production/app/"))
            .stdout(predicate::str::contains("java-production/lib/h9"));
    }

    #[test]
    fn outputs_json() {
        let temp = TempDir::new().unwrap();
        write_state(temp.path());

        let output = cachesync(&temp)
            .args(["outputs", "-f", "json", "--project"])
            .arg(temp.path())
            .output()
            .unwrap();
        assert!(output.status.success());

        let outputs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let outputs = outputs.as_array().unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(outputs
            .iter()
            .any(|o| o["category"] == "production" && o["name"] == "app"));
    }

    #[test]
    fn outputs_missing_state() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["outputs", "--project"])
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn history_without_server() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["history", "--commit", "deadbeef"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No remote server URL configured"));
    }

    #[test]
    fn completions_generate() {
        let temp = TempDir::new().unwrap();
        cachesync(&temp)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cachesync"));
    }

    #[test]
    fn upload_twice_only_rewrites_history() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());
        let server = BlobServer::start();

        upload(&temp, &server)
            .assert()
            .success()
            .stdout(predicate::str::contains("Commit deadbeef recorded in history"));

        let first = server.puts();
        assert_eq!(first.len(), 8);
        for address in [
            "caches/deadbeef",
            "metadata/deadbeef",
            "out/deadbeef",
            "dist/deadbeef",
            "buildSrc/deadbeef",
            "java-production/lib/h9",
        ] {
            assert!(first.iter().any(|put| put == address), "missing {}", address);
        }
        assert_eq!(first.last().map(String::as_str), Some("commit_history.json"));

        upload(&temp, &server)
            .assert()
            .success()
            .stdout(predicate::str::contains("already in history"));

        assert_eq!(server.puts()[first.len()..], ["commit_history.json".to_string()]);
        let history: serde_json::Value =
            serde_json::from_slice(&server.blob("commit_history.json").unwrap()).unwrap();
        assert_eq!(
            history["git@github.com:JetBrains/kotlin.git"],
            serde_json::json!(["deadbeef"])
        );
    }

    #[test]
    fn upload_writes_report() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());
        let server = BlobServer::start();
        let report_path = temp.path().join("report.json");

        upload(&temp, &server)
            .args(["--bundle", "caches", "--bundle", "dist", "--report"])
            .arg(&report_path)
            .assert()
            .success();

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["commit"], "deadbeef");
        assert_eq!(report["transfers"].as_array().unwrap().len(), 3);
        assert!(report["transfers"]
            .as_array()
            .unwrap()
            .iter()
            .all(|t| t["action"] == "uploaded"));
        assert_eq!(report["failures"], serde_json::json!([]));
        assert_eq!(report["history"]["status"], "recorded");
        assert_eq!(report["history"]["added"], true);
    }

    #[test]
    fn upload_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());
        let server = BlobServer::start();

        upload(&temp, &server)
            .arg("--dry-run")
            .assert()
            .success()
            .stdout(predicate::str::contains("Would upload"))
            .stdout(predicate::str::contains("dist/deadbeef"))
            .stdout(predicate::str::contains("would be recorded in history"));

        assert!(server.puts().is_empty());
    }

    #[test]
    fn upload_failures_exit_non_zero_only_when_strict() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());
        fs::remove_dir_all(temp.path().join("dist")).unwrap();
        let server = BlobServer::start();

        upload(&temp, &server)
            .args(["--bundle", "dist"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 job(s) failed"));

        upload(&temp, &server)
            .args(["--bundle", "dist", "--strict"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Upload finished with 1 failed job(s)"));

        assert!(server.puts().is_empty());
    }
}
