//! The reference hosting sequence against the `DotNetLib` payload.

use log::{info, warn};

use crate::config::{FailurePolicy, HostConfig};
use crate::error::{HostError, Result};
use crate::hostfxr::Hostfxr;
use crate::invoke::{invoke, Callback, EntryPointTarget, Invocation, InvocationOutcome};
use crate::loader::AssemblyDelegateLoader;
use crate::pdstring::{self, PdChar};

/// `DotNetLib.Lib.LibArgs`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LibArgs {
    pub message: *const PdChar,
    pub number: i32,
}

pub const HELLO: &str = "Hello";
pub const CUSTOM_ENTRY_POINT_UNMANAGED_CALLERS_ONLY: &str = "CustomEntryPointUnmanagedCallersOnly";
pub const CUSTOM_ENTRY_POINT: &str = "CustomEntryPoint";
pub const TEST_FN_PTR: &str = "TestFnPtr";
pub const TEST_FN_PTR_WITH_ARGS: &str = "TestFnPtrWithArgs";
pub const TEST_STRING_INPUT_OUTPUT: &str = "TestStringInputOutput";

const HOST_MESSAGE: &str = "from host!";
const NATIVE_REPLY: &str = "This string is from native code :)";
#[allow(clippy::approx_constant)]
const NUMERIC_REPLY_OFFSET: f64 = 3.14;

#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub completed: Vec<(&'static str, InvocationOutcome)>,
    pub failed: Vec<(&'static str, HostError)>,
}

impl ScenarioReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, step: &'static str, result: Result<InvocationOutcome>, policy: FailurePolicy) -> Result<()> {
        match result {
            Ok(outcome) => {
                info!("{} completed", step);
                self.completed.push((step, outcome));
                Ok(())
            }
            Err(error) if policy == FailurePolicy::Continue => {
                warn!("{} failed, continuing: {}", step, error);
                self.failed.push((step, error));
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

/// Initializes the runtime from the payload's runtime config, then runs
/// every entry point in order.
pub fn run_component_example(hostfxr: &Hostfxr, config: &HostConfig) -> Result<ScenarioReport> {
    let config_path = config.runtime_config_path();
    println!("Config Path: {}", config_path.display());
    let loader = hostfxr.initialize_for_runtime_config(&config_path)?;
    run_entry_points(&loader, config)
}

pub fn run_entry_points(loader: &AssemblyDelegateLoader, config: &HostConfig) -> Result<ScenarioReport> {
    let assembly_path = config.assembly_path();
    let target = |method_name: &'static str| EntryPointTarget {
        assembly_path: assembly_path.as_path(),
        type_name: &config.type_name,
        method_name,
    };
    let message = pdstring::encode(HOST_MESSAGE)?;
    let args = |number: i32| LibArgs {
        message: message.as_ptr(),
        number,
    };
    let policy = config.failure_policy;
    let mut report = ScenarioReport::default();

    // Safety for every call below: the signatures match the members declared
    // by DotNetLib.Lib, and LibArgs mirrors its sequential LibArgs struct.
    let hello = unsafe { invoke(loader, &target(HELLO), Invocation::Default((0..3).map(args).collect())) };
    report.record(HELLO, hello, policy)?;

    let unmanaged = unsafe {
        invoke(
            loader,
            &target(CUSTOM_ENTRY_POINT_UNMANAGED_CALLERS_ONLY),
            Invocation::UnmanagedOnly(args(-1)),
        )
    };
    report.record(CUSTOM_ENTRY_POINT_UNMANAGED_CALLERS_ONLY, unmanaged, policy)?;

    let custom = unsafe {
        invoke(
            loader,
            &target(CUSTOM_ENTRY_POINT),
            Invocation::CustomDelegate {
                delegate_type: config.custom_delegate_type.clone(),
                args: args(-1),
            },
        )
    };
    report.record(CUSTOM_ENTRY_POINT, custom, policy)?;

    let plain = unsafe { invoke(loader, &target(TEST_FN_PTR), Invocation::callback(Callback::Plain(native_callback))) };
    report.record(TEST_FN_PTR, plain, policy)?;

    let numeric = unsafe {
        invoke(
            loader,
            &target(TEST_FN_PTR_WITH_ARGS),
            Invocation::callback(Callback::numeric(|value| {
                println!("[native] A closure received {} from managed code!", value);
                f64::from(value) + NUMERIC_REPLY_OFFSET
            })),
        )
    };
    report.record(TEST_FN_PTR_WITH_ARGS, numeric, policy)?;

    let text = unsafe {
        invoke(
            loader,
            &target(TEST_STRING_INPUT_OUTPUT),
            Invocation::callback(Callback::text(|input| {
                println!("[native] Managed code sent the following string: {}", input);
                NATIVE_REPLY.to_string()
            })),
        )
    };
    report.record(TEST_STRING_INPUT_OUTPUT, text, policy)?;

    Ok(report)
}

extern "system" fn native_callback() {
    println!("[native] In native code again!");
}

#[cfg(test)]
mod tests {
    use super::{run_component_example, run_entry_points, CUSTOM_ENTRY_POINT, TEST_FN_PTR};
    use crate::config::{FailurePolicy, HostConfig};
    use crate::error::HostError;
    use crate::invoke::InvocationOutcome;
    use crate::testing::{self, FakeHost};

    #[test]
    fn full_sequence_runs_in_order() {
        let _fake = FakeHost::install();
        let config = HostConfig::new("/app");
        let report = run_component_example(&testing::hostfxr(), &config).expect("scenario runs");
        assert!(report.is_success());
        assert_eq!(report.completed.len(), 6);
        assert_eq!(report.completed[0].1, InvocationOutcome::Default(vec![0, 0, 0]));
        assert_eq!(testing::close_count(), 1);
        assert_eq!(
            testing::last_config_path(),
            Some(config.runtime_config_path().display().to_string())
        );
        assert_eq!(
            testing::managed_log(),
            vec![
                "Hello from host! 0".to_string(),
                "Hello from host! 1".to_string(),
                "Hello from host! 2".to_string(),
                "CustomEntryPointUnmanagedCallersOnly from host! -1".to_string(),
                "CustomEntryPoint from host! -1".to_string(),
                "TestFnPtr".to_string(),
                "TestFnPtrWithArgs got 23.14".to_string(),
                "TestStringInputOutput got This string is from native code :)".to_string(),
            ]
        );
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let _fake = FakeHost::install();
        let mut config = HostConfig::new("/app");
        config.custom_delegate_type = "DotNetLib.Lib+Missing, DotNetLib".to_string();
        let error = run_entry_points(&testing::loader(), &config).expect_err("custom delegate fails");
        assert!(matches!(error, HostError::Resolution { ref method, .. } if method == CUSTOM_ENTRY_POINT));
        assert!(!testing::managed_log().iter().any(|line| line == TEST_FN_PTR));
    }

    #[test]
    fn continue_policy_records_failure_and_proceeds() {
        let _fake = FakeHost::install();
        let mut config = HostConfig::new("/app");
        config.custom_delegate_type = "DotNetLib.Lib+Missing, DotNetLib".to_string();
        config.failure_policy = FailurePolicy::Continue;
        let report = run_entry_points(&testing::loader(), &config).expect("scenario continues");
        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, CUSTOM_ENTRY_POINT);
        assert_eq!(report.completed.len(), 5);
        assert!(testing::managed_log().iter().any(|line| line == TEST_FN_PTR));
    }

    #[test]
    fn init_failure_is_fatal_regardless_of_policy() {
        let _fake = FakeHost::install();
        testing::set_init_result(0x8000_8096_u32 as i32, true);
        let mut config = HostConfig::new("/app");
        config.failure_policy = FailurePolicy::Continue;
        let error = run_component_example(&testing::hostfxr(), &config).expect_err("init fails");
        assert!(matches!(error, HostError::Initialization { .. }));
        assert!(testing::managed_log().is_empty());
        assert_eq!(testing::close_count(), 1);
    }
}
