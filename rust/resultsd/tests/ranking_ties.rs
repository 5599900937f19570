use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .env_remove("RESULTSD_WORKSPACE")
        .env("RESULTSD_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    fn start(workspace: &PathBuf) -> Self {
        let (child, stdin, reader) = spawn_sidecar();
        let mut s = Self {
            child,
            stdin,
            reader,
            next_id: 0,
        };
        s.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
        s
    }

    fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value["id"], id.as_str());
        value
    }

    fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.call(method, params);
        assert_eq!(value["ok"], true, "{} failed: {}", method, value);
        value["result"].clone()
    }

    fn fails(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.call(method, params);
        assert_eq!(value["ok"], false, "{} unexpectedly succeeded: {}", method, value);
        value["error"].clone()
    }

    fn stop(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

const SESSION: &str = "2024/2025";

fn seed_class(s: &mut Sidecar, class_name: &str, students: &[(&str, Option<i64>)]) -> String {
    let subject = s.ok("subjects.create", json!({ "className": class_name, "name": "Agricultural Science" }))
        ["subject"]["id"]
        .as_str()
        .expect("subject id")
        .to_string();
    for (id, exam) in students {
        s.ok(
            "students.create",
            json!({ "studentId": id, "fullName": format!("Pupil {}", id), "className": class_name }),
        );
        if let Some(exam) = exam {
            // Tests of 30 average to 30, so each total is 30 + exam.
            s.ok(
                "scores.upsert",
                json!({
                    "studentId": id, "subjectId": subject, "term": "2nd", "session": SESSION,
                    "pt1": 30, "pt2": 30, "pt3": 30, "exam": exam,
                }),
            );
        }
    }
    subject
}

fn ranking(s: &mut Sidecar, class_name: &str) -> serde_json::Value {
    s.ok(
        "ranking.class",
        json!({ "className": class_name, "term": "2nd", "session": SESSION }),
    )
}

#[test]
fn tied_totals_share_a_position_and_skip_the_next() {
    let workspace = temp_dir("resultsd-ranking-ties");
    let mut s = Sidecar::start(&workspace);
    seed_class(
        &mut s,
        "JSS 3",
        &[("J3-04", Some(40)), ("J3-02", Some(60)), ("J3-03", Some(50)), ("J3-01", Some(60))],
    );

    let r = ranking(&mut s, "JSS 3");
    let rows: Vec<(String, i64, i64)> = r["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|e| {
            (
                e["studentId"].as_str().unwrap_or_default().to_string(),
                e["termTotalScore"].as_i64().unwrap_or(-1),
                e["position"].as_i64().unwrap_or(-1),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("J3-01".to_string(), 90, 1),
            ("J3-02".to_string(), 90, 1),
            ("J3-03".to_string(), 80, 3),
            ("J3-04".to_string(), 70, 4),
        ]
    );
    assert_eq!(r["entries"][2]["positionLabel"], "3rd");
    assert_eq!(r["rankedCount"], 4);
    assert_eq!(r["classAverage"], 82.5);

    for _ in 0..3 {
        assert_eq!(ranking(&mut s, "JSS 3"), r);
    }

    s.stop();
    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn students_without_scores_are_listed_unranked() {
    let workspace = temp_dir("resultsd-ranking-unscored");
    let mut s = Sidecar::start(&workspace);
    seed_class(&mut s, "KG 1", &[("K-1", Some(20)), ("K-2", None), ("K-3", Some(45))]);

    let r = ranking(&mut s, "KG 1");
    assert_eq!(r["classSize"], 3);
    assert_eq!(r["rankedCount"], 2);
    assert_eq!(r["entries"][0]["studentId"], "K-3");
    assert_eq!(r["entries"][2]["studentId"], "K-2");
    assert!(r["entries"][2]["position"].is_null());
    assert_eq!(r["entries"][2]["percentage"], 0.0);
    // Only ranked students count towards the class average: (75 + 50) / 2.
    assert_eq!(r["classAverage"], 62.5);

    let results = s.ok(
        "reports.classResults",
        json!({ "className": "KG 1", "term": "2nd", "session": SESSION }),
    );
    assert_eq!(results["snapshotHash"], r["snapshotHash"]);
    assert_eq!(results["students"][0]["grade"]["letter"], "A");
    assert!(results["students"][2]["grade"].is_null());
    assert_eq!(results["subjectAverages"][0]["classAverage"], 62.5);

    s.stop();
    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn inactive_students_drop_out_of_the_ranking() {
    let workspace = temp_dir("resultsd-ranking-inactive");
    let mut s = Sidecar::start(&workspace);
    let subject = seed_class(&mut s, "SS1", &[("S-1", Some(70)), ("S-2", Some(10))]);
    let before = ranking(&mut s, "SS1");

    s.ok("students.deactivate", json!({ "studentId": "S-1" }));
    let after = ranking(&mut s, "SS1");
    assert_eq!(after["classSize"], 1);
    assert_eq!(after["entries"][0]["studentId"], "S-2");
    assert_eq!(after["entries"][0]["position"], 1);
    assert_ne!(before["snapshotHash"], after["snapshotHash"]);

    // Stored scores survive deactivation.
    let kept = s.ok(
        "scores.get",
        json!({ "studentId": "S-1", "subjectId": subject, "term": "2nd", "session": SESSION }),
    );
    assert_eq!(kept["entry"]["totalScore"], 100);

    let e = s.fails(
        "ranking.class",
        json!({ "className": "Grade 10", "term": "2nd", "session": SESSION }),
    );
    assert_eq!(e["code"], "not_found");

    s.stop();
    let _ = std::fs::remove_dir_all(&workspace);
}
