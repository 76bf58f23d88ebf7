//! Workflow CRUD, execution and approval

use gatewayqa_harness::clients::WorkflowsClient;
use gatewayqa_harness::generator::{resource_name, workflow_data};
use gatewayqa_harness::{
    ensure, poll, FixtureScope, HarnessError, HarnessResult, PollPolicy, PollStatus, TestCase,
};
use serde_json::{json, Value};

use super::exercise_gate;

/// States `/status` may report while a workflow moves along
const EXECUTION_STATES: &[&str] = &["draft", "started", "in_progress", "waiting_approval", "completed", "failed"];

pub fn tests() -> Vec<TestCase> {
    vec![
        TestCase::new("creates and fetches a workflow", create_and_get),
        TestCase::new("workflow without steps is rejected", reject_empty_steps),
        TestCase::new("lists workflows page by page", list_paginated),
        TestCase::new("updates a workflow", update_workflow),
        TestCase::new("unknown workflow is 404", unknown_workflow),
        TestCase::new("executes and reports status", execute_and_poll_status),
        TestCase::new("create then approve", approve_flow).tag("@exercise"),
    ]
}

fn state_of(body: &Value) -> &str {
    body["status"]
        .as_str()
        .or_else(|| body["state"].as_str())
        .unwrap_or_default()
}

async fn create_and_get(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let workflows = WorkflowsClient::new(&ctx);
    let data = workflow_data();

    let created = workflows.create(&data).await?;
    created.expect_status(&[200, 201])?;
    let id = created.id_field(&["id", "workflowId"])?;

    let fetched = workflows.get(&id).await?;
    fetched.expect_status(&[200])?;
    let body = fetched.json_value()?;
    ensure!(body["name"] == data.name.as_str(), "name {} != {}", body["name"], data.name);
    Ok(())
}

async fn reject_empty_steps(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let body = json!({ "name": resource_name("wf"), "description": "no steps", "steps": [] });
    ctx.post("/v1/workflows/", &body).await?.expect_status(&[400])?;
    Ok(())
}

async fn list_paginated(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let response = WorkflowsClient::new(&ctx).list(1, 10).await?;
    response.expect_status(&[200])?;

    let body = response.json_value()?;
    let items = body["workflows"].as_array().or_else(|| body.as_array());
    ensure!(items.is_some(), "workflow list is not a list: {}", body);
    ensure!(
        items.map_or(0, |i| i.len()) <= 10,
        "page holds more than the requested limit"
    );
    Ok(())
}

async fn update_workflow(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let workflows = WorkflowsClient::new(&ctx);

    let id = workflows.create(&workflow_data()).await?.id_field(&["id", "workflowId"])?;
    let renamed = resource_name("wf-renamed");
    let updated = workflows
        .update(&id, &json!({ "name": renamed, "description": "updated by test" }))
        .await?;
    updated.expect_status(&[200])?;
    ensure!(
        updated.json_value()?["name"] == renamed.as_str(),
        "update did not apply the new name"
    );
    Ok(())
}

async fn unknown_workflow(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let workflows = WorkflowsClient::new(&ctx);
    workflows.get("non-existent-id").await?.expect_status(&[404])?;
    workflows
        .execute("non-existent", "test@example.com")
        .await?
        .expect_status(&[404])?;
    Ok(())
}

async fn execute_and_poll_status(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let workflows = WorkflowsClient::new(&ctx);

    let id = workflows.create(&workflow_data()).await?.id_field(&["id", "workflowId"])?;
    let started = workflows.execute(&id, "test-user@example.com").await?;
    started.expect_status(&[200, 202])?;
    started.id_field(&["execution_id"])?;

    let state = poll(PollPolicy::default(), |_| {
        let workflows = &workflows;
        let id = &id;
        async move {
            let response = workflows.status(id).await?;
            response.expect_status(&[200])?;
            let body = response.json_value()?;
            let state = state_of(&body).to_string();
            Ok::<_, HarnessError>(if state == "started" || state == "draft" {
                PollStatus::Pending
            } else {
                PollStatus::Ready(state)
            })
        }
    })
    .await?;

    ensure!(
        EXECUTION_STATES.contains(&state.as_str()),
        "unknown execution state {}",
        state
    );
    Ok(())
}

async fn approve_flow(scope: FixtureScope) -> HarnessResult<()> {
    exercise_gate()?;
    let ctx = scope.svc_request().await?;
    let workflows = WorkflowsClient::new(&ctx);

    let created = workflows.create(&workflow_data()).await?;
    created.expect_ok()?;
    let id = created.id_field(&["id", "workflowId"])?;

    workflows.approve(&id, "ok").await?.expect_ok()?;

    let fetched = workflows.get(&id).await?;
    fetched.expect_ok()?;
    let body = fetched.json_value()?;
    let state = state_of(&body);
    ensure!(
        ["approved", "rejected", "completed"].contains(&state),
        "unexpected state after approval: {}",
        state
    );
    Ok(())
}
