use std::process::Command;

use css_minimizer::worker::{ProcessPool, WorkerCommand};
use css_minimizer::{MinifierStage, MinifyRequest};
use pretty_assertions::assert_eq;

fn worker_command() -> WorkerCommand {
  WorkerCommand::new(env!("CARGO_BIN_EXE_css-minimizer"), ["worker"])
}

fn request(name: &str, code: &str) -> MinifyRequest {
  MinifyRequest {
    name: String::from(name),
    code: String::from(code),
    stages: vec![MinifierStage {
      minifier: String::from("lightningcss"),
      options: serde_json::Value::Null,
    }],
    ..MinifyRequest::default()
  }
}

#[tokio::test(flavor = "multi_thread")]
async fn minifies_in_worker_processes() {
  let pool = ProcessPool::new(2, &worker_command()).unwrap();

  let (first, second, third) = tokio::join!(
    pool.run(request("a.css", ".a { color: red; }")),
    pool.run(request("b.css", ".b { color: #ff0000; }")),
    pool.run(request("c.css", ".c { margin: 0px; }")),
  );

  assert_eq!(first.unwrap().code, ".a{color:red}");
  assert_eq!(second.unwrap().code, ".b{color:red}");
  assert_eq!(third.unwrap().code, ".c{margin:0}");

  pool.teardown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_unknown_minifiers_as_task_errors() {
  let pool = ProcessPool::new(1, &worker_command()).unwrap();

  let result = pool
    .run(MinifyRequest {
      stages: vec![MinifierStage {
        minifier: String::from("cssnano"),
        options: serde_json::Value::Null,
      }],
      ..request("a.css", "a {}")
    })
    .await
    .unwrap();

  assert!(result.is_error());

  pool.teardown().await;
}

#[test]
fn builds_files_from_the_command_line() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("a.css"), ".a {\n  color: red;\n}\n").unwrap();
  std::fs::write(dir.path().join("b.css"), ".b {\n  margin: 0px;\n}\n").unwrap();

  let status = Command::new(env!("CARGO_BIN_EXE_css-minimizer"))
    .current_dir(dir.path())
    .args(["build", "--parallel", "2", "--out-dir", "out", "a.css", "b.css"])
    .status()
    .unwrap();

  assert!(status.success());
  assert_eq!(
    std::fs::read_to_string(dir.path().join("out/a.css")).unwrap(),
    ".a{color:red}"
  );
  assert_eq!(
    std::fs::read_to_string(dir.path().join("out/b.css")).unwrap(),
    ".b{margin:0}"
  );
}
