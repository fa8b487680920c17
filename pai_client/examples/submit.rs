use ::pai_client::JobClient;
use ::pai_common::{
    error::Result,
    job::{Job, ResourceOverrides},
};

fn main() -> Result<()> {
    let mut client = JobClient::new("http://10.0.0.1", "alice", Some("secret".to_owned()));
    client.add_webhdfs("http://10.0.0.1:50070")?;

    let mut job = Job::simple(
        "mnist",
        "openpai/pytorch-py36-cu90",
        "cd code && python mnist.py",
        ResourceOverrides::default().gpu_number(1),
        true,
    );
    job.add_source_files(["mnist.py"], "/user/alice/jobs");

    let url = client.acquire_token(3600)?.submit(&mut job, false)?;
    println!("Job {} submitted: {}", job.name, url);
    Ok(())
}
