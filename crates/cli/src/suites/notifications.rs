//! Notification lifecycle

use gatewayqa_harness::clients::NotificationsClient;
use gatewayqa_harness::generator::notification_data;
use gatewayqa_harness::{ensure, FixtureScope, HarnessResult, TestCase};

pub fn tests() -> Vec<TestCase> {
    [
        TestCase::new("notification create, read, unread, delete", lifecycle),
        TestCase::new("filters notifications by type", list_by_type),
        TestCase::new("broadcasts to several recipients", broadcast),
        TestCase::new("unknown notification is 404", unknown_notification),
    ]
    .into_iter()
    .map(|t| t.tag("@contract"))
    .collect()
}

async fn lifecycle(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let notifications = NotificationsClient::new(&ctx);
    let data = notification_data(None);

    let created = notifications.create(&data).await?;
    created.expect_status(&[201])?;
    let body = created.json_value()?;
    ensure!(body["title"] == data.title.as_str(), "title was not stored");
    ensure!(body["status"] == "unread", "new notification is {}", body["status"]);
    let id = created.id_field(&["id"])?;

    let read = notifications.mark_read(&id).await?;
    read.expect_status(&[200])?;
    ensure!(read.json_value()?["status"] == "read", "mark_read did not apply");

    let unread = notifications.mark_unread(&id).await?;
    unread.expect_status(&[200])?;
    ensure!(unread.json_value()?["status"] == "unread", "mark_unread did not apply");

    notifications.delete(&id).await?.expect_status(&[200, 204])?;
    notifications.get(&id).await?.expect_status(&[404])?;
    Ok(())
}

async fn list_by_type(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let notifications = NotificationsClient::new(&ctx);
    notifications.create(&notification_data(None)).await?.expect_ok()?;

    let response = notifications.list(&[("type", "info")]).await?;
    response.expect_status(&[200])?;
    let body = response.json_value()?;
    if let Some(items) = body["notifications"].as_array() {
        ensure!(
            items.iter().all(|n| n["type"] == "info"),
            "type filter returned other kinds"
        );
    }
    Ok(())
}

async fn broadcast(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    let user = scope.user().await?;
    NotificationsClient::new(&ctx)
        .broadcast(&[user.email.as_str(), "test-user@example.com"], &notification_data(None))
        .await?
        .expect_status(&[200, 201, 202])?;
    Ok(())
}

async fn unknown_notification(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    NotificationsClient::new(&ctx)
        .get("non-existent-id")
        .await?
        .expect_status(&[404])?;
    Ok(())
}
