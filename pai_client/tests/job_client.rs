use ::std::path::{Path, PathBuf};

use ::httpmock::prelude::*;
use ::mockall::{mock, Sequence};
use ::pai_client::{
    storage::{FileStatus, Storage},
    JobClient,
};
use ::pai_common::{
    anyhow::anyhow,
    error::{PaiError, PaiErrorType, Result, UnexpectedResponse},
    job::{Job, ResourceOverrides},
    serde_json::json,
};

mock! {
    pub Storage {}
    impl Storage for Storage {
        fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()>;
        fn download(&self, remote_path: &str, local_path: &Path, overwrite: bool) -> Result<PathBuf>;
        fn status(&self, remote_path: &str) -> Result<Option<FileStatus>>;
    }
}

static JOBS_PATH: &str = "/rest-server/api/v1/user/alice/jobs";
static TOKEN_PATH: &str = "/rest-server/api/v1/token";

fn train_job() -> Job {
    Job::simple(
        "train",
        "ubuntu",
        "python train.py",
        ResourceOverrides::default(),
        false,
    )
}

fn expect_upload(storage: &mut MockStorage, seq: &mut Sequence, file: &'static str, ok: bool) {
    let remote = format!("/user/alice/train/code/{}", file);
    storage
        .expect_upload()
        .withf(move |local, remote_path| local == Path::new(file) && remote_path == remote)
        .times(1)
        .in_sequence(seq)
        .returning(move |_, _| {
            if ok {
                Ok(())
            } else {
                Err(PaiError::storage(anyhow!("disk full")))
            }
        });
}

#[test]
fn acquire_token_success() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH).json_body(json!({
            "username": "alice",
            "password": "secret",
            "expiration": 60,
        }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "token": "abc" }));
    });
    let mut client = JobClient::new(server.base_url(), "alice", Some("secret".to_owned()));
    client.acquire_token(60).unwrap();

    mock.assert();
    let token = client.token().unwrap();
    assert_eq!(token.value, "abc");
    assert!(token.expires_at.is_some());
    assert!(!token.is_expired());
}

#[test]
fn acquire_token_rejected() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(401).body("bad credentials");
    });
    let mut client = JobClient::new(server.base_url(), "alice", Some("wrong".to_owned()));
    let err = client.acquire_token(60).map(|_| ()).unwrap_err();

    mock.assert();
    assert_eq!(err.get_error_type(), PaiErrorType::Authentication);
    assert_eq!(
        err.unexpected_response(),
        Some(&UnexpectedResponse {
            status: 401,
            body: "bad credentials".to_owned()
        })
    );
    assert!(client.token().is_none());
}

#[test]
fn acquire_token_twice_refreshes() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200).json_body(json!({ "token": "abc" }));
    });
    let mut client = JobClient::new(server.base_url(), "alice", Some("secret".to_owned()));
    client.acquire_token(60).unwrap().acquire_token(120).unwrap();

    mock.assert_hits(2);
    assert_eq!(client.token().unwrap().value, "abc");
}

#[test]
fn submit_success() {
    let server = MockServer::start();
    let mut job = train_job();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(JOBS_PATH)
            .header("Authorization", "Bearer abc")
            .json_body_obj(&job);
        then.status(202);
    });
    let client = JobClient::new(server.base_url(), "alice", None).with_token("abc");
    let url = client.submit(&mut job, false).unwrap();

    mock.assert();
    assert_eq!(
        url,
        format!(
            "{}/job-detail.html?username=alice&jobName=train",
            server.base_url()
        )
    );
}

#[test]
fn submit_with_unexpected_status() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH);
        then.status(200).body("job exists");
    });
    let client = JobClient::new(server.base_url(), "alice", None).with_token("abc");
    let err = client.submit(&mut train_job(), false).unwrap_err();

    mock.assert();
    assert_eq!(err.get_error_type(), PaiErrorType::Submission);
    assert_eq!(
        err.unexpected_response(),
        Some(&UnexpectedResponse {
            status: 200,
            body: "job exists".to_owned()
        })
    );
}

#[test]
fn submit_without_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH);
        then.status(202);
    });
    let client = JobClient::new(server.base_url(), "alice", None);
    let err = client.submit(&mut train_job(), false).unwrap_err();

    mock.assert_hits(0);
    assert_eq!(err.get_error_type(), PaiErrorType::Authentication);
}

#[test]
fn submit_stages_sources_in_order() {
    let server = MockServer::start();
    let mut storage = MockStorage::new();
    let mut seq = Sequence::new();
    expect_upload(&mut storage, &mut seq, "a.py", true);
    expect_upload(&mut storage, &mut seq, "b.py", true);

    let mut job = train_job();
    job.add_source_files(["a.py", "b.py"], "/user/alice");
    let mut expected = job.clone();
    expected.code_dir = "$PAI_DEFAULT_FS_URI/user/alice/train/code".to_owned();
    let mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH).json_body_obj(&expected);
        then.status(202);
    });

    let mut client = JobClient::new(server.base_url(), "alice", None).with_token("abc");
    client.add_storage(Box::new(storage));
    client.submit(&mut job, false).unwrap();

    mock.assert();
    assert_eq!(job.code_dir, "$PAI_DEFAULT_FS_URI/user/alice/train/code");
}

#[test]
fn submit_sources_without_code_root() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH);
        then.status(202);
    });
    let mut storage = MockStorage::new();
    storage.expect_upload().never();

    let mut job = train_job();
    job.add_source_files(["a.py"], "");
    let mut client = JobClient::new(server.base_url(), "alice", None).with_token("abc");
    client.add_storage(Box::new(storage));
    let err = client.submit(&mut job, false).unwrap_err();

    mock.assert_hits(0);
    assert_eq!(err.get_error_type(), PaiErrorType::Validation);
    assert_eq!(job.code_dir, "");
}

#[test]
fn submit_inside_job_container() {
    std::env::set_var("PAI_TEST_CONTAINER_ID_NESTED", "container_e01_000001");
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH);
        then.status(202);
    });
    let mut storage = MockStorage::new();
    storage.expect_upload().never();

    let mut job = train_job();
    job.add_source_files(["a.py"], "/user/alice");
    let mut client = JobClient::new(server.base_url(), "alice", None)
        .with_token("abc")
        .with_container_marker("PAI_TEST_CONTAINER_ID_NESTED");
    client.add_storage(Box::new(storage));
    let err = client.submit(&mut job, false).unwrap_err();

    mock.assert_hits(0);
    assert_eq!(err.get_error_type(), PaiErrorType::Policy);
}

#[test]
fn submit_inside_job_container_when_allowed() {
    std::env::set_var("PAI_TEST_CONTAINER_ID_ALLOWED", "container_e01_000001");
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH);
        then.status(202);
    });
    let client = JobClient::new(server.base_url(), "alice", None)
        .with_token("abc")
        .with_container_marker("PAI_TEST_CONTAINER_ID_ALLOWED");
    client.submit(&mut train_job(), true).unwrap();

    mock.assert();
}

#[test]
fn submit_stops_at_first_failed_upload() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH);
        then.status(202);
    });
    let mut storage = MockStorage::new();
    let mut seq = Sequence::new();
    expect_upload(&mut storage, &mut seq, "a.py", true);
    expect_upload(&mut storage, &mut seq, "b.py", false);
    storage
        .expect_upload()
        .withf(|local, _| local == Path::new("c.py"))
        .never();

    let mut job = train_job();
    job.add_source_files(["a.py", "b.py", "c.py"], "/user/alice");
    let mut client = JobClient::new(server.base_url(), "alice", None).with_token("abc");
    client.add_storage(Box::new(storage));
    let err = client.submit(&mut job, false).unwrap_err();
    // verify the upload expectations
    drop(client);

    mock.assert_hits(0);
    assert_eq!(err.get_error_type(), PaiErrorType::Upload);
    let message = err.to_string();
    assert_eq!(
        message,
        "Upload error: failed to upload b.py: Storage error: disk full"
    );
    assert!(!message.contains("c.py"));
    assert_eq!(job.code_dir, "");
}

#[test]
fn submit_with_unreachable_cluster() {
    let client = JobClient::new("http://127.0.0.1:1", "alice", None).with_token("abc");
    let err = client.submit(&mut train_job(), false).unwrap_err();

    assert_eq!(err.get_error_type(), PaiErrorType::Connectivity);
}

#[test]
fn list_job_names() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(JOBS_PATH);
        then.status(200)
            .json_body(json!([{ "name": "a" }, { "name": "b" }]));
    });
    let client = JobClient::new(server.base_url(), "alice", None);
    let names = client.list_job_names(None).unwrap();

    mock.assert();
    assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
}

#[test]
fn list_jobs_records() {
    let server = MockServer::start();
    let records = json!([
        { "name": "a", "state": "RUNNING" },
        { "name": "b", "state": "SUCCEEDED" }
    ]);
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(JOBS_PATH)
            .header("Authorization", "Bearer abc");
        then.status(200).json_body(records.clone());
    });
    let client = JobClient::new(server.base_url(), "alice", None).with_token("abc");
    let jobs = client.list_jobs(None).unwrap();

    mock.assert();
    assert_eq!(json!(jobs), records);
}

#[test]
fn list_single_job() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("{}/a", JOBS_PATH));
        then.status(200)
            .json_body(json!({ "name": "a", "state": "RUNNING" }));
    });
    let client = JobClient::new(server.base_url(), "alice", None);
    let names = client.list_job_names(Some("a")).unwrap();

    mock.assert();
    assert_eq!(names, vec!["a".to_owned()]);
}

#[test]
fn list_jobs_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(JOBS_PATH);
        then.status(500);
    });
    let client = JobClient::new(server.base_url(), "alice", None);
    let err = client.list_jobs(None).unwrap_err();

    mock.assert();
    assert_eq!(err.get_error_type(), PaiErrorType::Submission);
    assert_eq!(err.unexpected_response().map(|r| r.status), Some(500));
}
