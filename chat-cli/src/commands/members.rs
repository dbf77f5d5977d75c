//! List or edit group members.

use anyhow::{Context, Result};

use huddle_client::{ClientConfig, GroupMembershipService, RestApi};
use huddle_types::{GroupId, UserId};

use crate::render;

fn service(config: &ClientConfig) -> GroupMembershipService<RestApi> {
    GroupMembershipService::new(RestApi::new(
        &config.server.http_base_url,
        &config.identity.token,
    ))
}

/// Print the members of `group`.
pub async fn list(config: &ClientConfig, group: GroupId) -> Result<()> {
    let members = service(config)
        .list_members(&group)
        .await
        .with_context(|| format!("Failed to list members of {group}"))?;
    println!("{}", render::member_list(&members));
    Ok(())
}

/// Add `user` to `group` and print the resulting members.
pub async fn add(config: &ClientConfig, group: GroupId, user: UserId) -> Result<()> {
    let members = service(config).add_member(&group, &user).await?;
    println!("Added {user} to {group}");
    println!("Members: {}", render::member_list(&members));
    Ok(())
}

/// Remove `user` from `group` and print the resulting members.
pub async fn remove(config: &ClientConfig, group: GroupId, user: UserId) -> Result<()> {
    let members = service(config).remove_member(&group, &user).await?;
    println!("Removed {user} from {group}");
    println!("Members: {}", render::member_list(&members));
    Ok(())
}
