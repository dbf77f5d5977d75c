//! Resolve or create a project's group.

use anyhow::{Context, Result};

use huddle_client::{ChatApi, ClientConfig, GroupMembershipService, RestApi};
use huddle_types::{GroupId, ProjectId, UserId};

/// Run the ensure-group command.
pub async fn run(config: &ClientConfig, project: ProjectId, members: Vec<UserId>) -> Result<()> {
    let service = GroupMembershipService::new(RestApi::new(
        &config.server.http_base_url,
        &config.identity.token,
    ));
    let group = ensure(&service, &project, members).await?;
    println!("{group}");
    Ok(())
}

/// Seed from `members`, or from the project roster when none are given.
async fn ensure<A: ChatApi>(
    service: &GroupMembershipService<A>,
    project: &ProjectId,
    members: Vec<UserId>,
) -> Result<GroupId> {
    let candidates = if members.is_empty() {
        service
            .candidate_members(project)
            .await
            .context("Failed to load project roster")?
    } else {
        members
    };
    service
        .ensure_group(project, candidates)
        .await
        .with_context(|| format!("Failed to ensure group for project {project}"))
}
