//! AI completion and batch jobs

use gatewayqa_harness::clients::AiClient;
use gatewayqa_harness::contract::JobStatus;
use gatewayqa_harness::{ensure, poll, FixtureScope, HarnessError, HarnessResult, PollPolicy, PollStatus, TestCase};

use super::exercise_gate;

pub fn tests() -> Vec<TestCase> {
    vec![
        TestCase::new("healthz returns ok", healthz).tag("@smoke"),
        TestCase::new("ai complete with api key", complete_with_service_key),
        TestCase::new("ai complete with user JWT", complete_with_user_jwt),
        TestCase::new("ai complete without credentials is 401", complete_without_auth).tag("@security"),
        TestCase::new("batch completes and reports outputs", batch_job_completes).tag("@exercise"),
        TestCase::new("empty batch is rejected", empty_batch_rejected).tag("@exercise"),
    ]
}

async fn healthz(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let response = ctx.get("/healthz").await?;
    response.expect_status(&[200])?;
    let body = response.json_value()?;
    ensure!(body["status"] == "ok", "unexpected health body: {}", body);
    Ok(())
}

async fn complete_and_check(scope: &FixtureScope, model: &str, user: bool) -> HarnessResult<()> {
    let ctx = if user {
        scope.user_request().await?
    } else {
        scope.svc_request().await?
    };
    let response = AiClient::new(&ctx).complete("Hello", model).await?;
    response.expect_status(&[200])?;

    let body = response.json_value()?;
    ensure!(body["model"] == model, "model {} != {}", body["model"], model);
    ensure!(body["completion"].is_string(), "completion is not a string: {}", body);
    Ok(())
}

async fn complete_with_service_key(scope: FixtureScope) -> HarnessResult<()> {
    complete_and_check(&scope, "adapter-a", false).await
}

async fn complete_with_user_jwt(scope: FixtureScope) -> HarnessResult<()> {
    complete_and_check(&scope, "adapter-b", true).await
}

async fn complete_without_auth(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    AiClient::new(&ctx)
        .complete("Hello", "adapter-a")
        .await?
        .expect_status(&[401])?;
    Ok(())
}

async fn batch_job_completes(scope: FixtureScope) -> HarnessResult<()> {
    exercise_gate()?;
    let ctx = scope.svc_request().await?;
    let ai = AiClient::new(&ctx);

    let accepted = ai.batch(&["hello", "world", "from qa"]).await?;
    accepted.expect_status(&[200, 202])?;
    let job_id = accepted.id_field(&["jobId", "id"])?;

    let job = poll(PollPolicy::default(), |_| {
        let ai = &ai;
        let job_id = &job_id;
        async move {
            let response = ai.job(job_id).await?;
            response.expect_ok()?;
            let status: JobStatus = response.json()?;
            Ok::<_, HarnessError>(if status.is_completed() {
                PollStatus::Ready(status)
            } else {
                PollStatus::Pending
            })
        }
    })
    .await?;

    ensure!(job.outputs.is_some(), "completed job has no outputs list");
    Ok(())
}

async fn empty_batch_rejected(scope: FixtureScope) -> HarnessResult<()> {
    exercise_gate()?;
    let ctx = scope.svc_request().await?;
    AiClient::new(&ctx).batch(&[]).await?.expect_status(&[400])?;
    Ok(())
}
