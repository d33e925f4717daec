//! DataSync tasks

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_datasync::operation::describe_task::DescribeTaskOutput;
use aws_sdk_datasync::types::{
    Atime, FilterRule, FilterType, Gid, LogLevel, Mtime, Options, OverwriteMode,
    PosixPermissions, PreserveDeletedFiles, PreserveDevices, TaskQueueing, TaskSchedule,
    TransferMode, Uid, VerifyMode,
};
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;
use stratus_core::waiter::{RefreshResult, StateChangeConf};

use super::{create_tags, is_not_found, read_tags, update_tags_between};
use crate::awserr::sdk_error;
use crate::conns::AwsClients;
use crate::resources::{any_changed, build_error, missing_field, require_str, set_str, single_block};
use crate::schemas;

const CREATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const STATUS_AVAILABLE: &str = "AVAILABLE";
const STATUS_UNAVAILABLE: &str = "UNAVAILABLE";
const STATUS_PENDING: &[&str] = &["CREATING", "QUEUED", "RUNNING"];

/// Attributes changed in place through UpdateTask
const UPDATABLE: &[&str] = &[
    "name",
    "cloudwatch_log_group_arn",
    "options",
    "schedule",
    "excludes",
];

pub struct Task;

impl ResourceDefinition<AwsClients> for Task {
    fn name(&self) -> &'static str {
        "datasync.task"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::datasync::task_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_task(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_task(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_task(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_task(conn, id, identifier))
    }
}

fn expand_options(block: &HashMap<String, Value>) -> Options {
    let s = |key: &str| block.get_str(key);
    Options::builder()
        .set_atime(s("atime").map(Atime::from))
        .set_bytes_per_second(block.get_int("bytes_per_second"))
        .set_gid(s("gid").map(Gid::from))
        .set_log_level(s("log_level").map(LogLevel::from))
        .set_mtime(s("mtime").map(Mtime::from))
        .set_overwrite_mode(s("overwrite_mode").map(OverwriteMode::from))
        .set_posix_permissions(s("posix_permissions").map(PosixPermissions::from))
        .set_preserve_deleted_files(s("preserve_deleted_files").map(PreserveDeletedFiles::from))
        .set_preserve_devices(s("preserve_devices").map(PreserveDevices::from))
        .set_task_queueing(s("task_queueing").map(TaskQueueing::from))
        .set_transfer_mode(s("transfer_mode").map(TransferMode::from))
        .set_uid(s("uid").map(Uid::from))
        .set_verify_mode(s("verify_mode").map(VerifyMode::from))
        .build()
}

fn flatten_options(options: &Options) -> Value {
    let mut block = HashMap::new();
    set_str(&mut block, "atime", options.atime().map(Atime::as_str));
    if let Some(bps) = options.bytes_per_second() {
        block.insert("bytes_per_second".to_string(), Value::Int(bps));
    }
    set_str(&mut block, "gid", options.gid().map(Gid::as_str));
    set_str(&mut block, "log_level", options.log_level().map(LogLevel::as_str));
    set_str(&mut block, "mtime", options.mtime().map(Mtime::as_str));
    set_str(
        &mut block,
        "overwrite_mode",
        options.overwrite_mode().map(OverwriteMode::as_str),
    );
    set_str(
        &mut block,
        "posix_permissions",
        options.posix_permissions().map(PosixPermissions::as_str),
    );
    set_str(
        &mut block,
        "preserve_deleted_files",
        options.preserve_deleted_files().map(PreserveDeletedFiles::as_str),
    );
    set_str(
        &mut block,
        "preserve_devices",
        options.preserve_devices().map(PreserveDevices::as_str),
    );
    set_str(
        &mut block,
        "task_queueing",
        options.task_queueing().map(TaskQueueing::as_str),
    );
    set_str(
        &mut block,
        "transfer_mode",
        options.transfer_mode().map(TransferMode::as_str),
    );
    set_str(&mut block, "uid", options.uid().map(Uid::as_str));
    set_str(&mut block, "verify_mode", options.verify_mode().map(VerifyMode::as_str));
    single_block(block)
}

/// Schedule to send; an absent block clears the schedule with an empty
/// expression
fn expand_schedule(
    id: &ResourceId,
    attrs: &HashMap<String, Value>,
) -> ProviderResult<TaskSchedule> {
    let expression = attrs
        .get_block("schedule")
        .and_then(|b| b.get_str("schedule_expression"))
        .unwrap_or_default();
    TaskSchedule::builder()
        .schedule_expression(expression)
        .build()
        .map_err(|e| build_error(id, "TaskSchedule", e))
}

fn expand_excludes(attrs: &HashMap<String, Value>) -> Vec<FilterRule> {
    attrs
        .get_blocks("excludes")
        .into_iter()
        .map(|block| {
            FilterRule::builder()
                .set_filter_type(block.get_str("filter_type").map(FilterType::from))
                .set_value(block.get_str("value").map(str::to_string))
                .build()
        })
        .collect()
}

fn flatten_task(task: &DescribeTaskOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    set_str(&mut attributes, "arn", task.task_arn());
    set_str(&mut attributes, "name", task.name());
    set_str(&mut attributes, "source_location_arn", task.source_location_arn());
    set_str(
        &mut attributes,
        "destination_location_arn",
        task.destination_location_arn(),
    );
    set_str(
        &mut attributes,
        "cloudwatch_log_group_arn",
        task.cloud_watch_log_group_arn(),
    );
    if let Some(options) = task.options() {
        attributes.insert("options".to_string(), flatten_options(options));
    }
    if let Some(schedule) = task
        .schedule()
        .map(TaskSchedule::schedule_expression)
        .filter(|e| !e.is_empty())
    {
        attributes.insert(
            "schedule".to_string(),
            single_block(HashMap::from([(
                "schedule_expression".to_string(),
                Value::from(schedule),
            )])),
        );
    }
    let excludes: Vec<Value> = task
        .excludes()
        .iter()
        .map(|rule| {
            let mut block = HashMap::new();
            set_str(&mut block, "filter_type", rule.filter_type().map(FilterType::as_str));
            set_str(&mut block, "value", rule.value());
            Value::Map(block)
        })
        .collect();
    if !excludes.is_empty() {
        attributes.insert("excludes".to_string(), Value::List(excludes));
    }
    attributes
}

async fn find_task(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
) -> ProviderResult<Option<DescribeTaskOutput>> {
    debug!("DataSync DescribeTask {}", arn);
    match conn.datasync.describe_task().task_arn(arn).send().await {
        Ok(output) => Ok(Some(output)),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(sdk_error("Failed to read DataSync task", id, err)),
    }
}

/// Error for a task DataSync marked unusable
fn unavailable_error(id: &ResourceId, task: &DescribeTaskOutput) -> ProviderError {
    ProviderError::new(format!(
        "DataSync task {} is UNAVAILABLE: {} ({})",
        task.task_arn().unwrap_or_default(),
        task.error_detail().unwrap_or("no detail"),
        task.error_code().unwrap_or("no error code"),
    ))
    .for_resource(id.clone())
}

async fn status_task(conn: &AwsClients, id: &ResourceId, arn: &str) -> RefreshResult<()> {
    let Some(task) = find_task(conn, id, arn).await? else {
        return Ok(None);
    };
    let status = task.status().map(|s| s.as_str().to_string()).unwrap_or_default();
    if status == STATUS_UNAVAILABLE {
        return Err(unavailable_error(id, &task));
    }
    Ok(Some(((), status)))
}

async fn create_task(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let excludes = expand_excludes(attrs);
    let schedule = match attrs.get_block("schedule") {
        Some(_) => Some(expand_schedule(id, attrs)?),
        None => None,
    };

    debug!("DataSync CreateTask for {}", id);
    let output = conn
        .datasync
        .create_task()
        .source_location_arn(require_str(id, attrs, "source_location_arn")?)
        .destination_location_arn(require_str(id, attrs, "destination_location_arn")?)
        .set_name(attrs.get_str("name").map(str::to_string))
        .set_cloud_watch_log_group_arn(attrs.get_str("cloudwatch_log_group_arn").map(str::to_string))
        .set_options(attrs.get_block("options").map(expand_options))
        .set_schedule(schedule)
        .set_excludes((!excludes.is_empty()).then_some(excludes))
        .set_tags(create_tags(conn, id, attrs.get("tags"))?)
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create DataSync task", id, e))?;
    let arn = output
        .task_arn()
        .ok_or_else(|| missing_field(id, "CreateTask", "TaskArn"))?
        .to_string();

    StateChangeConf::new(STATUS_PENDING, &[STATUS_AVAILABLE], CREATE_TIMEOUT)
        .with_min_timeout(Duration::from_secs(5))
        .wait(|| status_task(conn, id, &arn))
        .await?;
    info!("created DataSync task {} ({})", arn, id);

    read_task(conn, id, &arn).await
}

async fn read_task(conn: &AwsClients, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let Some(task) = find_task(conn, id, arn).await? else {
        warn!("DataSync task {} not found, removing {} from state", arn, id);
        return Ok(State::not_found(id.clone()));
    };
    let mut attributes = flatten_task(&task);
    read_tags(conn, id, arn, &mut attributes).await?;
    Ok(State::existing(id.clone(), attributes).with_identifier(arn))
}

fn task_settings_changed(from: &HashMap<String, Value>, to: &HashMap<String, Value>) -> bool {
    any_changed(&schemas::datasync::task_schema(), from, to, UPDATABLE)
}

async fn update_task(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = &to.attributes;
    if task_settings_changed(&from.attributes, attrs) {
        debug!("DataSync UpdateTask {}", arn);
        conn.datasync
            .update_task()
            .task_arn(arn)
            .set_name(attrs.get_str("name").map(str::to_string))
            .set_cloud_watch_log_group_arn(
                attrs.get_str("cloudwatch_log_group_arn").map(str::to_string),
            )
            .set_options(attrs.get_block("options").map(expand_options))
            .schedule(expand_schedule(id, attrs)?)
            .set_excludes(Some(expand_excludes(attrs)))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to update DataSync task", id, e))?;
    }
    update_tags_between(conn, id, arn, &from.attributes, attrs).await?;
    read_task(conn, id, arn).await
}

async fn delete_task(conn: &AwsClients, id: &ResourceId, arn: &str) -> ProviderResult<()> {
    debug!("DataSync DeleteTask {}", arn);
    match conn.datasync.delete_task().task_arn(arn).send().await {
        Ok(_) => {
            info!("deleted DataSync task {} ({})", arn, id);
            Ok(())
        }
        Err(err) if is_not_found(&err) => Ok(()),
        Err(err) => Err(sdk_error("Failed to delete DataSync task", id, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_datasync::types::TaskStatus;

    fn id() -> ResourceId {
        ResourceId::new("datasync.task", "nightly")
    }

    fn block(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn expand_options_sends_only_configured_fields() {
        let options = expand_options(&block(vec![
            ("verify_mode", Value::from("ONLY_FILES_TRANSFERRED")),
            ("bytes_per_second", Value::Int(-1)),
        ]));
        assert_eq!(options.verify_mode(), Some(&VerifyMode::OnlyFilesTransferred));
        assert_eq!(options.bytes_per_second(), Some(-1));
        assert_eq!(options.atime(), None);
        assert_eq!(options.uid(), None);
    }

    #[test]
    fn flatten_options_covers_every_field() {
        let options = Options::builder()
            .atime(Atime::BestEffort)
            .bytes_per_second(-1)
            .gid(Gid::IntValue)
            .log_level(LogLevel::Off)
            .mtime(Mtime::Preserve)
            .overwrite_mode(OverwriteMode::Always)
            .posix_permissions(PosixPermissions::Preserve)
            .preserve_deleted_files(PreserveDeletedFiles::Preserve)
            .preserve_devices(PreserveDevices::None)
            .task_queueing(TaskQueueing::Enabled)
            .transfer_mode(TransferMode::Changed)
            .uid(Uid::IntValue)
            .verify_mode(VerifyMode::PointInTimeConsistent)
            .build();
        let value = flatten_options(&options);
        let flat = value.first_block().unwrap();
        assert_eq!(flat.len(), 13);
        assert_eq!(flat.get_str("atime"), Some("BEST_EFFORT"));
        assert_eq!(flat.get_str("verify_mode"), Some("POINT_IN_TIME_CONSISTENT"));
        assert_eq!(flat.get_int("bytes_per_second"), Some(-1));
    }

    #[test]
    fn missing_schedule_clears_expression() {
        let schedule = expand_schedule(&id(), &HashMap::new()).unwrap();
        assert_eq!(schedule.schedule_expression(), "");

        let mut attrs = HashMap::new();
        attrs.insert(
            "schedule".to_string(),
            single_block(block(vec![(
                "schedule_expression",
                Value::from("cron(0 12 ? * SUN,WED *)"),
            )])),
        );
        let schedule = expand_schedule(&id(), &attrs).unwrap();
        assert_eq!(schedule.schedule_expression(), "cron(0 12 ? * SUN,WED *)");
    }

    #[test]
    fn flatten_task_skips_empty_schedule() {
        let task = DescribeTaskOutput::builder()
            .task_arn("arn:aws:datasync:us-east-1:123456789012:task/task-0123")
            .status(TaskStatus::Available)
            .schedule(TaskSchedule::builder().schedule_expression("").build().unwrap())
            .excludes(
                FilterRule::builder()
                    .filter_type(FilterType::SimplePattern)
                    .value("/tmp|/cache")
                    .build(),
            )
            .build();
        let attrs = flatten_task(&task);
        assert!(attrs.get("schedule").is_none());
        let excludes = attrs.get_blocks("excludes");
        assert_eq!(excludes.len(), 1);
        assert_eq!(excludes[0].get_str("filter_type"), Some("SIMPLE_PATTERN"));
    }

    #[test]
    fn aws_filled_options_do_not_trigger_update_task() {
        let task = DescribeTaskOutput::builder()
            .task_arn("arn:aws:datasync:us-east-1:123456789012:task/task-0123")
            .name("nightly")
            .status(TaskStatus::Available)
            .options(
                Options::builder()
                    .atime(Atime::BestEffort)
                    .verify_mode(VerifyMode::PointInTimeConsistent)
                    .build(),
            )
            .build();
        let from = flatten_task(&task);

        let mut config = block(vec![
            ("name", Value::from("nightly")),
            (
                "options",
                single_block(block(vec![(
                    "verify_mode",
                    Value::from("POINT_IN_TIME_CONSISTENT"),
                )])),
            ),
            (
                "tags",
                Value::Map(HashMap::from([("team".to_string(), Value::from("data"))])),
            ),
        ]);
        assert!(!task_settings_changed(&from, &config));

        config.remove("options");
        assert!(!task_settings_changed(&from, &config));

        config.insert(
            "options".to_string(),
            single_block(block(vec![("verify_mode", Value::from("NONE"))])),
        );
        assert!(task_settings_changed(&from, &config));
    }

    #[test]
    fn unavailable_task_reports_aws_error() {
        let task = DescribeTaskOutput::builder()
            .task_arn("arn:aws:datasync:us-east-1:123456789012:task/task-0123")
            .status(TaskStatus::Unavailable)
            .error_code("InvalidLocation")
            .error_detail("location is unreachable")
            .build();
        let err = unavailable_error(&id(), &task);
        assert!(err.message.contains("location is unreachable"));
        assert!(err.message.contains("InvalidLocation"));
    }
}
