//! Execution of command-line operations against the ports.
//!
//! Command-line flags are translated into an ordered list of [`Operation`]s.
//! One [`Dispatcher`] owns every port and a shared [`Monitor`], and runs the
//! operations in order, stopping at the first failure.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::ValueEnum;
use monitor::{
    ArtifactLocation, ArtifactStore, Clock, Completion, DistributionLookup, FunctionName,
    FunctionRegistry, Monitor, MonitorRequest, Parameter, StackAction, StackName,
    StackOperations, StackParameters, StackRequest,
};
use packaging::PackageBuilder;
use tracing::{info, instrument, warn};

/// Stack parameter filled from the content distribution found by domain.
pub const DISTRIBUTION_ARN_PARAMETER: &str = "CloudFrontDistributionArn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StackCommand {
    Create,
    Update,
    Delete,
    /// Watch the event feed until interrupted.
    Monitor,
}

impl StackCommand {
    fn action(self) -> Option<StackAction> {
        match self {
            Self::Create => Some(StackAction::Create),
            Self::Update => Some(StackAction::Update),
            Self::Delete => Some(StackAction::Delete),
            Self::Monitor => None,
        }
    }
}

/// One unit of work requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Stack(StackCommand),
    Build,
    Upload,
    UpdateCode,
    Invoke,
}

impl Operation {
    /// Function operations selected by flags, in execution order.
    pub fn function_sequence(build: bool, upload: bool, update: bool, invoke: bool) -> Vec<Self> {
        [
            (build, Self::Build),
            (upload, Self::Upload),
            (update, Self::UpdateCode),
            (invoke, Self::Invoke),
        ]
        .into_iter()
        .filter_map(|(selected, op)| selected.then_some(op))
        .collect()
    }
}

/// Control-plane collaborators used by the dispatcher.
#[derive(Clone)]
pub struct Ports {
    pub stacks: Arc<dyn StackOperations>,
    pub distributions: Arc<dyn DistributionLookup>,
    pub functions: Arc<dyn FunctionRegistry>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

/// The managed stack and how to watch it.
#[derive(Debug, Clone)]
pub struct StackTarget {
    pub name: StackName,
    pub template_path: PathBuf,
    pub parameters: StackParameters,
    /// Alias domain of the content distribution.
    pub domain: String,
    pub idle_timeout: Option<Duration>,
}

/// The deployed function and its package.
#[derive(Debug, Clone)]
pub struct FunctionTarget {
    pub name: FunctionName,
    pub package: ArtifactLocation,
    pub invoke_output: PathBuf,
}

pub struct Dispatcher {
    ports: Ports,
    monitor: Arc<Monitor>,
    clock: Arc<dyn Clock>,
    packages: PackageBuilder,
    stack: StackTarget,
    function: FunctionTarget,
}

impl Dispatcher {
    pub fn new(
        ports: Ports,
        monitor: Arc<Monitor>,
        clock: Arc<dyn Clock>,
        packages: PackageBuilder,
        stack: StackTarget,
        function: FunctionTarget,
    ) -> Self {
        Self {
            ports,
            monitor,
            clock,
            packages,
            stack,
            function,
        }
    }

    /// Runs `operations` in order.
    ///
    /// `interrupt` resolves when the operator asks to stop; it only ends a
    /// passive `monitor`, which then counts as success.
    pub async fn run<F>(&self, operations: &[Operation], interrupt: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut interrupt = std::pin::pin!(interrupt);
        for op in operations {
            self.execute(*op, interrupt.as_mut()).await?;
        }
        Ok(())
    }

    async fn execute<F>(&self, op: Operation, interrupt: Pin<&mut F>) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        match op {
            Operation::Stack(command) => match command.action() {
                Some(action) => self.change_stack(action).await,
                None => self.observe(interrupt).await,
            },
            Operation::Build => self.build().await,
            Operation::Upload => self.upload().await,
            Operation::UpdateCode => self.update_code().await,
            Operation::Invoke => self.invoke().await,
        }
    }

    #[instrument(skip(self), fields(stack = %self.stack.name))]
    async fn change_stack(&self, action: StackAction) -> anyhow::Result<()> {
        let stack = self.stack.name.clone();
        let request = match action {
            StackAction::Delete => StackRequest::Delete { stack },
            StackAction::Create | StackAction::Update => {
                let template_body = tokio::fs::read_to_string(&self.stack.template_path)
                    .await
                    .with_context(|| {
                        format!("failed to read template {}", self.stack.template_path.display())
                    })?;
                let parameters = self.stack_parameters().await?;
                if action == StackAction::Create {
                    StackRequest::Create { stack, template_body, parameters }
                } else {
                    StackRequest::Update { stack, template_body, parameters }
                }
            }
        };

        let start = self.clock.now();
        self.ports.stacks.begin(&request).await?;
        info!(action = %request.action(), "stack operation started");

        let mut watch = MonitorRequest::new(self.stack.name.clone())
            .for_action(action)
            .with_start_time(start);
        if let Some(idle) = self.stack.idle_timeout {
            watch = watch.with_idle_timeout(idle);
        }

        let report = self.monitor.run(watch).await?;
        info!(events = report.events.len(), "stack operation finished");
        Ok(())
    }

    async fn observe<F>(&self, interrupt: Pin<&mut F>) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut watch = MonitorRequest::new(self.stack.name.clone());
        if let Some(idle) = self.stack.idle_timeout {
            watch = watch.with_idle_timeout(idle);
        }

        tokio::select! {
            result = self.monitor.run(watch) => {
                let report = result?;
                if report.outcome == Completion::Cancelled {
                    info!("monitoring cancelled");
                }
                Ok(())
            }
            () = interrupt => {
                info!("monitoring interrupted");
                Ok(())
            }
        }
    }

    /// Configured parameters without empty values, with the distribution ARN
    /// looked up by domain when not configured.
    pub(crate) async fn stack_parameters(&self) -> anyhow::Result<Vec<Parameter>> {
        let mut parameters = self.stack.parameters.normalize();
        if parameters.iter().any(|p| p.key == DISTRIBUTION_ARN_PARAMETER) {
            return Ok(parameters);
        }

        let domain = &self.stack.domain;
        let Some(distribution) = self.ports.distributions.find_by_alias(domain).await? else {
            bail!("Could not find content distribution with alternative domain: {domain}");
        };
        info!(distribution = %distribution.id, domain = %domain, "found content distribution");

        parameters.push(Parameter {
            key: DISTRIBUTION_ARN_PARAMETER.to_owned(),
            value: distribution.arn,
        });
        parameters.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(parameters)
    }

    async fn build(&self) -> anyhow::Result<()> {
        let archive = self.packages.build().await?;
        println!("Built {}", archive.display());
        Ok(())
    }

    #[instrument(skip(self), fields(location = %self.function.package))]
    async fn upload(&self) -> anyhow::Result<()> {
        let body = self.packages.read_archive().await?;
        let size = body.len();
        self.ports.artifacts.put(&self.function.package, body).await?;
        info!(bytes = size, "package uploaded");
        Ok(())
    }

    #[instrument(skip(self), fields(function = %self.function.name))]
    async fn update_code(&self) -> anyhow::Result<()> {
        self.ports
            .functions
            .update_code(&self.function.name, &self.function.package)
            .await?;
        info!(location = %self.function.package, "function code updated");
        Ok(())
    }

    #[instrument(skip(self), fields(function = %self.function.name))]
    async fn invoke(&self) -> anyhow::Result<()> {
        let result = self.ports.functions.invoke(&self.function.name).await?;
        let pretty = serde_json::to_string_pretty(&result.payload)?;

        let output = &self.function.invoke_output;
        tokio::fs::write(output, &pretty)
            .await
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("{pretty}");

        if let Some(error) = result.error() {
            warn!(error_type = %error.error_type, "function reported an error");
            bail!("function {} failed: {error}", self.function.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use monitor::{
        Distribution, EventSource, InvocationResult, ResourceId, ResourceStatus, ServiceError,
        StackEvent, SystemClock, Timestamp,
    };
    use packaging::PackageConfig;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    const STACK: &str = "HefokiUpdater";

    /// In-memory control plane. Accepting a request makes the stack report
    /// `<ACTION>_<outcome>` just after the acceptance time.
    struct FakeControlPlane {
        outcome: &'static str,
        requests: Mutex<Vec<StackRequest>>,
        events: Mutex<Vec<StackEvent>>,
        distributions: Vec<Distribution>,
        uploads: Mutex<Vec<(ArtifactLocation, usize)>>,
        code_updates: Mutex<Vec<(FunctionName, ArtifactLocation)>>,
        payload: serde_json::Value,
    }

    impl FakeControlPlane {
        fn new(outcome: &'static str) -> Self {
            Self {
                outcome,
                requests: Mutex::default(),
                events: Mutex::default(),
                distributions: vec![Distribution {
                    id: "E2ABC".to_owned(),
                    arn: "arn:cdn::distribution/E2ABC".to_owned(),
                    aliases: vec!["hefoki.today".to_owned()],
                }],
                uploads: Mutex::default(),
                code_updates: Mutex::default(),
                payload: json!({"statusCode": 200}),
            }
        }
    }

    #[async_trait]
    impl StackOperations for FakeControlPlane {
        async fn begin(&self, request: &StackRequest) -> Result<(), ServiceError> {
            let status = format!("{}_{}", request.action().status_prefix(), self.outcome);
            let event = StackEvent::new(
                Timestamp::now().saturating_add(Duration::from_millis(1)),
                ResourceId::new(request.stack().as_str()).unwrap(),
                ResourceStatus::new(status),
            );
            self.events.lock().unwrap().insert(0, event);
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl EventSource for FakeControlPlane {
        async fn fetch_events(&self, _stack: &StackName) -> Result<Vec<StackEvent>, ServiceError> {
            Ok(self.events.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl DistributionLookup for FakeControlPlane {
        async fn find_by_alias(&self, domain: &str) -> Result<Option<Distribution>, ServiceError> {
            Ok(self.distributions.iter().find(|d| d.has_alias(domain)).cloned())
        }
    }

    #[async_trait]
    impl FunctionRegistry for FakeControlPlane {
        async fn update_code(
            &self,
            function: &FunctionName,
            location: &ArtifactLocation,
        ) -> Result<(), ServiceError> {
            self.code_updates
                .lock()
                .unwrap()
                .push((function.clone(), location.clone()));
            Ok(())
        }

        async fn invoke(&self, _function: &FunctionName) -> Result<InvocationResult, ServiceError> {
            Ok(InvocationResult {
                payload: self.payload.clone(),
            })
        }
    }

    #[async_trait]
    impl ArtifactStore for FakeControlPlane {
        async fn put(&self, location: &ArtifactLocation, body: Vec<u8>) -> Result<(), ServiceError> {
            self.uploads.lock().unwrap().push((location.clone(), body.len()));
            Ok(())
        }
    }

    struct Harness {
        dir: TempDir,
        plane: Arc<FakeControlPlane>,
        dispatcher: Dispatcher,
    }

    fn harness(plane: FakeControlPlane, parameters: StackParameters) -> Harness {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("updater.cf.yaml");
        std::fs::write(&template, "Resources: {}\n").unwrap();

        let plane = Arc::new(plane);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let monitor = Monitor::new(plane.clone())
            .with_clock(clock.clone())
            .with_poll_interval(Duration::from_millis(1));
        let ports = Ports {
            stacks: plane.clone(),
            distributions: plane.clone(),
            functions: plane.clone(),
            artifacts: plane.clone(),
        };
        let packages = PackageBuilder::new(PackageConfig {
            build_dir: dir.path().join("build"),
            ..PackageConfig::default()
        });
        let dispatcher = Dispatcher::new(
            ports,
            Arc::new(monitor),
            clock,
            packages,
            StackTarget {
                name: StackName::new(STACK).unwrap(),
                template_path: template,
                parameters,
                domain: "hefoki.today".to_owned(),
                idle_timeout: Some(Duration::from_secs(5)),
            },
            FunctionTarget {
                name: FunctionName::new("hefoki-updater").unwrap(),
                package: ArtifactLocation::new("hefoki", "packages/updater.zip"),
                invoke_output: dir.path().join("file.json"),
            },
        );
        Harness {
            dir,
            plane,
            dispatcher,
        }
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    #[test]
    fn function_flags_run_in_fixed_order() {
        assert_eq!(
            Operation::function_sequence(true, false, true, true),
            [Operation::Build, Operation::UpdateCode, Operation::Invoke]
        );
        assert!(Operation::function_sequence(false, false, false, false).is_empty());
    }

    #[tokio::test]
    async fn create_submits_template_and_waits_for_completion() {
        let h = harness(FakeControlPlane::new("COMPLETE"), StackParameters::default());

        h.dispatcher
            .run(&[Operation::Stack(StackCommand::Create)], never())
            .await
            .unwrap();

        let requests = h.plane.requests.lock().unwrap();
        match &requests[..] {
            [StackRequest::Create { stack, template_body, parameters }] => {
                assert_eq!(stack.as_str(), STACK);
                assert_eq!(template_body, "Resources: {}\n");
                assert_eq!(
                    parameters.as_slice(),
                    [Parameter {
                        key: DISTRIBUTION_ARN_PARAMETER.to_owned(),
                        value: "arn:cdn::distribution/E2ABC".to_owned(),
                    }]
                );
            }
            other => panic!("unexpected requests: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_update_is_an_error() {
        let h = harness(FakeControlPlane::new("ROLLBACK_FAILED"), StackParameters::default());

        let err = h
            .dispatcher
            .run(&[Operation::Stack(StackCommand::Update)], never())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("UPDATE_ROLLBACK_FAILED"), "{err}");
    }

    #[tokio::test]
    async fn delete_skips_template_and_parameters() {
        let mut plane = FakeControlPlane::new("COMPLETE");
        plane.distributions.clear();
        let h = harness(plane, StackParameters::default());

        h.dispatcher
            .run(&[Operation::Stack(StackCommand::Delete)], never())
            .await
            .unwrap();

        assert!(matches!(
            h.plane.requests.lock().unwrap().as_slice(),
            [StackRequest::Delete { .. }]
        ));
    }

    #[tokio::test]
    async fn configured_distribution_is_kept_and_empty_values_dropped() {
        let parameters: StackParameters = [
            (DISTRIBUTION_ARN_PARAMETER.to_owned(), Some("arn:configured".to_owned())),
            ("UpdaterInterval".to_owned(), Some(String::new())),
            ("TableName".to_owned(), None),
        ]
        .into_iter()
        .collect();
        let h = harness(FakeControlPlane::new("COMPLETE"), parameters);

        let parameters = h.dispatcher.stack_parameters().await.unwrap();

        assert_eq!(
            parameters,
            [Parameter {
                key: DISTRIBUTION_ARN_PARAMETER.to_owned(),
                value: "arn:configured".to_owned(),
            }]
        );
    }

    #[tokio::test]
    async fn unknown_distribution_domain_stops_before_any_request() {
        let mut plane = FakeControlPlane::new("COMPLETE");
        plane.distributions.clear();
        let h = harness(plane, StackParameters::default());

        let err = h
            .dispatcher
            .run(&[Operation::Stack(StackCommand::Create)], never())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("hefoki.today"));
        assert!(h.plane.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn passive_monitor_ends_cleanly_on_interrupt() {
        let h = harness(FakeControlPlane::new("COMPLETE"), StackParameters::default());

        h.dispatcher
            .run(&[Operation::Stack(StackCommand::Monitor)], async {})
            .await
            .unwrap();

        assert!(h.plane.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_requires_a_built_archive() {
        let h = harness(FakeControlPlane::new("COMPLETE"), StackParameters::default());

        let err = h
            .dispatcher
            .run(&[Operation::Upload], never())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("build it first"), "{err}");
        assert!(h.plane.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_then_update_point_function_at_package() {
        let h = harness(FakeControlPlane::new("COMPLETE"), StackParameters::default());
        let build = h.dir.path().join("build");
        std::fs::create_dir_all(&build).unwrap();
        std::fs::write(build.join("package.zip"), vec![0u8; 64]).unwrap();

        h.dispatcher
            .run(&[Operation::Upload, Operation::UpdateCode], never())
            .await
            .unwrap();

        let location = ArtifactLocation::new("hefoki", "packages/updater.zip");
        assert_eq!(
            h.plane.uploads.lock().unwrap().as_slice(),
            [(location.clone(), 64)]
        );
        assert_eq!(
            h.plane.code_updates.lock().unwrap().as_slice(),
            [(FunctionName::new("hefoki-updater").unwrap(), location)]
        );
    }

    #[tokio::test]
    async fn invoke_writes_payload_to_output_file() {
        let h = harness(FakeControlPlane::new("COMPLETE"), StackParameters::default());

        h.dispatcher.run(&[Operation::Invoke], never()).await.unwrap();

        let written = std::fs::read_to_string(h.dir.path().join("file.json")).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(payload, json!({"statusCode": 200}));
    }

    #[tokio::test]
    async fn invoke_fails_when_function_reports_error() {
        let mut plane = FakeControlPlane::new("COMPLETE");
        plane.payload = json!({"errorType": "TypeError", "errorMessage": "x is undefined"});
        let h = harness(plane, StackParameters::default());

        let err = h
            .dispatcher
            .run(&[Operation::Invoke], never())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("TypeError"));
        assert!(h.dir.path().join("file.json").exists());
    }
}
