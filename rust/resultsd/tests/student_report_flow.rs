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

fn score(
    s: &mut Sidecar,
    student: &str,
    subject: &str,
    term: &str,
    marks: [i64; 4],
) -> serde_json::Value {
    s.ok(
        "scores.upsert",
        json!({
            "studentId": student,
            "subjectId": subject,
            "term": term,
            "session": SESSION,
            "pt1": marks[0],
            "pt2": marks[1],
            "pt3": marks[2],
            "exam": marks[3],
        }),
    )
}

#[test]
fn third_term_report_combines_every_section() {
    let workspace = temp_dir("resultsd-report-flow");
    let mut s = Sidecar::start(&workspace);

    for (id, name) in [("JS2-01", "Adaeze Okafor"), ("JS2-02", "Bello Musa")] {
        s.ok(
            "students.create",
            json!({ "studentId": id, "fullName": name, "className": "JSS 2", "gender": "F" }),
        );
    }
    let english = s.ok("subjects.create", json!({ "className": "JSS 2", "name": "English" }))
        ["subject"]["id"]
        .as_str()
        .expect("english id")
        .to_string();
    let maths = s.ok("subjects.create", json!({ "className": "JSS 2", "name": "Mathematics" }))
        ["subject"]["id"]
        .as_str()
        .expect("maths id")
        .to_string();

    // English: 1st 70, 2nd missing, 3rd 85. Maths: 1st 50, 2nd 60, 3rd 64.
    score(&mut s, "JS2-01", &english, "1st", [20, 20, 20, 50]);
    score(&mut s, "JS2-01", &english, "3rd", [25, 25, 25, 60]);
    score(&mut s, "JS2-01", &maths, "1st", [10, 10, 10, 40]);
    score(&mut s, "JS2-01", &maths, "2nd", [20, 20, 20, 40]);
    score(&mut s, "JS2-01", &maths, "3rd", [10, 11, 11, 53]);
    score(&mut s, "JS2-02", &english, "3rd", [30, 30, 30, 70]);
    score(&mut s, "JS2-02", &maths, "3rd", [30, 30, 30, 70]);

    s.ok(
        "psychomotor.upsert",
        json!({
            "studentId": "JS2-01", "term": "3rd", "session": SESSION,
            "skills": {
                "attendance": "a", "punctuality": "B", "neatness": "A", "honesty": "A",
                "responsibility": "B", "creativity": "C", "sports": "D"
            }
        }),
    );
    s.ok(
        "attendance.upsert",
        json!({ "studentId": "JS2-01", "term": "3rd", "session": SESSION, "daysOpened": 64, "daysPresent": 60 }),
    );
    s.ok(
        "comments.upsert",
        json!({ "studentId": "JS2-01", "term": "3rd", "session": SESSION,
                "teacherComment": "A focused term.", "headTeacherComment": "Well done." }),
    );

    let report = s.ok(
        "reports.student",
        json!({ "studentId": "JS2-01", "term": "3rd", "session": SESSION }),
    );

    assert_eq!(report["student"]["fullName"], "Adaeze Okafor");
    assert_eq!(report["term"], "3rd");
    let academic = report["academic"].as_array().expect("academic rows");
    assert_eq!(academic.len(), 2);

    let eng = &academic[0];
    assert_eq!(eng["subjectName"], "English");
    assert_eq!(eng["avgPt"], 25);
    assert_eq!(eng["totalScore"], 85);
    assert_eq!(eng["grade"], "A");
    assert_eq!(eng["remark"], "Excellent");
    assert_eq!(eng["firstTermSubjectTotal"], 70);
    assert!(eng["secondTermSubjectTotal"].is_null());
    assert_eq!(eng["cumulativeSubjectAverage"], 77.5);
    assert_eq!(eng["subjectClassAverage"], 92.5);

    let mth = &academic[1];
    assert_eq!(mth["avgPt"], 11);
    assert_eq!(mth["totalScore"], 64);
    assert_eq!(mth["grade"], "B");
    assert_eq!(mth["firstTermSubjectTotal"], 50);
    assert_eq!(mth["secondTermSubjectTotal"], 60);
    assert_eq!(mth["cumulativeSubjectAverage"], 58.0);

    let overall = &report["overall"];
    assert_eq!(overall["totalScored"], 149);
    assert_eq!(overall["totalObtainable"], 200);
    assert_eq!(overall["percentage"], 74.5);
    assert_eq!(overall["gradeOfPercentage"]["letter"], "A");
    assert_eq!(overall["position"], 2);
    assert_eq!(overall["positionLabel"], "2nd");
    assert_eq!(overall["classSize"], 2);
    assert_eq!(overall["classAverage"], 87.25);

    let cumulative = &report["cumulative"];
    assert_eq!(cumulative["firstTermTotal"], 120);
    assert_eq!(cumulative["secondTermTotal"], 60);
    assert_eq!(cumulative["cumulativeAveragePercentage"], 64.83);

    assert_eq!(report["psychomotor"]["attendance"], "A");
    assert_eq!(report["psychomotor"]["sports"], "D");
    assert_eq!(report["attendance"]["daysOpened"], 64);
    assert_eq!(report["attendance"]["daysPresent"], 60);
    assert_eq!(report["attendance"]["presentPercentage"], 93.75);
    assert_eq!(report["comments"]["headTeacherComment"], "Well done.");

    let other = s.ok(
        "reports.student",
        json!({ "studentId": "JS2-02", "term": "3rd", "session": SESSION }),
    );
    assert_eq!(other["overall"]["position"], 1);
    assert!(other["psychomotor"].is_null());
    assert!(other["attendance"].is_null());
    assert!(other["comments"].is_null());

    s.stop();
    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn score_upsert_is_idempotent_and_validated() {
    let workspace = temp_dir("resultsd-score-upsert");
    let mut s = Sidecar::start(&workspace);
    s.ok(
        "students.create",
        json!({ "studentId": "P3-01", "fullName": "Chinedu Eze", "className": "Primary 3" }),
    );
    let subject = s.ok("subjects.create", json!({ "className": "Primary 3", "name": "Verbal Reasoning" }))
        ["subject"]["id"]
        .as_str()
        .expect("subject id")
        .to_string();

    let first = score(&mut s, "P3-01", &subject, "1st", [12, 18, 21, 44]);
    assert_eq!(first["changed"], true);
    assert_eq!(first["entry"]["totalScore"], 61);
    let report_before = s.ok(
        "reports.student",
        json!({ "studentId": "P3-01", "term": "1st", "session": SESSION }),
    );

    let again = score(&mut s, "P3-01", &subject, "1st", [12, 18, 21, 44]);
    assert_eq!(again["changed"], false);
    assert_eq!(again["entry"], first["entry"]);
    let report_after = s.ok(
        "reports.student",
        json!({ "studentId": "P3-01", "term": "1st", "session": SESSION }),
    );
    assert_eq!(report_before, report_after);

    let rows = s.ok(
        "scores.forStudent",
        json!({ "studentId": "P3-01", "term": "1st", "session": SESSION }),
    );
    assert_eq!(rows["entries"].as_array().map(|a| a.len()), Some(1));

    let e = s.fails(
        "scores.upsert",
        json!({ "studentId": "P3-01", "subjectId": subject, "term": "1st", "session": SESSION,
                "pt1": 31, "pt2": 0, "pt3": 0, "exam": 0 }),
    );
    assert_eq!(e["code"], "validation_error");
    assert_eq!(e["details"]["field"], "pt1");

    let e = s.fails(
        "scores.upsert",
        json!({ "studentId": "P3-01", "subjectId": subject, "term": "1st", "session": SESSION,
                "pt1": 0, "pt2": 0, "pt3": 0, "exam": 70.5 }),
    );
    assert_eq!(e["code"], "validation_error");

    let e = s.fails(
        "scores.upsert",
        json!({ "studentId": "P3-01", "subjectId": subject, "term": "1st", "session": "2024/2026",
                "pt1": 0, "pt2": 0, "pt3": 0, "exam": 0 }),
    );
    assert_eq!(e["code"], "validation_error");

    let e = s.fails(
        "scores.upsert",
        json!({ "studentId": "ghost", "subjectId": subject, "term": "1st", "session": SESSION,
                "pt1": 0, "pt2": 0, "pt3": 0, "exam": 0 }),
    );
    assert_eq!(e["code"], "not_found");

    let e = s.fails("subjects.delete", json!({ "subjectId": subject }));
    assert_eq!(e["code"], "conflict");

    s.stop();
    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn missing_attendance_is_null_not_zero() {
    let workspace = temp_dir("resultsd-attendance-null");
    let mut s = Sidecar::start(&workspace);
    s.ok(
        "students.create",
        json!({ "studentId": "N1-01", "fullName": "Dami Ade", "className": "Nursery 1" }),
    );

    let got = s.ok(
        "attendance.get",
        json!({ "studentId": "N1-01", "term": "2nd", "session": SESSION }),
    );
    assert!(got["entry"].is_null());

    let e = s.fails(
        "attendance.upsert",
        json!({ "studentId": "N1-01", "term": "2nd", "session": SESSION, "daysOpened": 50, "daysPresent": 51 }),
    );
    assert_eq!(e["code"], "validation_error");

    let report = s.ok(
        "reports.student",
        json!({ "studentId": "N1-01", "term": "2nd", "session": SESSION }),
    );
    assert!(report["attendance"].is_null());
    assert_eq!(report["overall"]["percentage"], 0.0);
    assert_eq!(report["overall"]["totalObtainable"], 0);
    assert!(report["overall"]["position"].is_null());

    s.stop();
    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn approval_resets_when_marks_change() {
    let workspace = temp_dir("resultsd-approval");
    let mut s = Sidecar::start(&workspace);
    s.ok(
        "students.create",
        json!({ "studentId": "SS2-07", "fullName": "Efe Ojo", "className": "SS2" }),
    );
    let subject = s.ok("subjects.create", json!({ "className": "SS2", "name": "Physics" }))
        ["subject"]["id"]
        .as_str()
        .expect("subject id")
        .to_string();

    let saved = score(&mut s, "SS2-07", &subject, "2nd", [15, 15, 15, 45]);
    let result_id = saved["entry"]["id"].as_str().expect("result id").to_string();
    let approved = s.ok("results.approve", json!({ "resultId": result_id }));
    assert_eq!(approved["entry"]["approved"], true);

    let stats = s.ok("results.stats", json!({}));
    assert_eq!(stats["approved"], 1);
    assert_eq!(stats["pending"], 0);

    let changed = score(&mut s, "SS2-07", &subject, "2nd", [15, 15, 15, 46]);
    assert_eq!(changed["entry"]["approved"], false);
    let pending = s.ok("results.list", json!({ "approved": false }));
    assert_eq!(pending["results"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(pending["results"][0]["studentName"], "Efe Ojo");

    let e = s.fails("results.approve", json!({ "resultId": "nope" }));
    assert_eq!(e["code"], "not_found");

    s.stop();
    let _ = std::fs::remove_dir_all(&workspace);
}
