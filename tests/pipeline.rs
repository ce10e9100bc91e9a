use ferrous_ioc::pipeline::{
    default_design_stages, default_runtime_stages, AutoRun, DesignContext, DesignStage, InjectProperties,
    RegisterSingleton, ResolveConstructorArgs, RuntimeContext, RuntimePhase, RuntimeStage,
};
use ferrous_ioc::{
    Injector, InjectorScope, IocError, IocResult, ParamSpec, Platform, ProviderBinding, ResolutionObserver,
    ResolveOptions, Resolver, Token, TracingObserver, TypeDescriptor,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordTokens(Mutex<Vec<String>>);

impl DesignStage for RecordTokens {
    fn name(&self) -> &'static str {
        "record-tokens"
    }

    fn run(&self, ctx: &mut DesignContext<'_>) -> IocResult<()> {
        let methods = ctx.reflect().method_names().len();
        self.0.lock().push(format!("{} ({} methods)", ctx.descriptor().token(), methods));
        Ok(())
    }
}

struct Widget {
    stamped: bool,
}

fn widget() -> TypeDescriptor {
    TypeDescriptor::builder::<Widget>()
        .token(Token::name("Widget"))
        .construct(|_| Ok(Widget { stamped: false }))
        .method("size", vec![], |_: &Widget, _| Ok(1u8))
        .build()
}

#[test]
fn appended_design_stages_see_indexed_reflection() {
    let recorder = Arc::new(RecordTokens::default());
    let root = Injector::root(Platform::builder().design_stage(recorder.clone()).build());
    root.register(widget()).unwrap();
    assert_eq!(*recorder.0.lock(), ["Widget (1 methods)"]);
}

#[test]
fn replacing_design_stages_changes_what_registration_does() {
    let recorder = Arc::new(RecordTokens::default());
    let platform = Platform::builder()
        .design_stages(vec![recorder.clone() as Arc<dyn DesignStage>])
        .build();
    let root = Injector::root(platform.clone());
    root.register(widget()).unwrap();

    // Nothing indexed, nothing bound.
    assert_eq!(*recorder.0.lock(), ["Widget (0 methods)"]);
    assert!(root.is_empty());
    assert!(platform.reflect(&Token::name("Widget")).unwrap().method("size").is_none());
    assert_eq!(default_design_stages().len(), 4);
}

struct Stamp;

impl RuntimeStage for Stamp {
    fn name(&self) -> &'static str {
        "stamp"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Initialize
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        if let Some(widget) = ctx.pending_mut().and_then(|p| p.downcast_mut::<Widget>()) {
            widget.stamped = true;
        }
        Ok(())
    }
}

#[test]
fn initialize_stages_mutate_the_instance_before_it_is_shared() {
    let root = Injector::root(Platform::builder().runtime_stage(Arc::new(Stamp)).build());
    root.register(widget()).unwrap();
    assert!(root.get_token::<Widget>(&Token::name("Widget")).unwrap().stamped);
}

struct Prebuilt;

impl RuntimeStage for Prebuilt {
    fn name(&self) -> &'static str {
        "prebuilt"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Prepare
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        if ctx.token() == &Token::name("Widget") {
            ctx.set_pending(Box::new(Widget { stamped: true }));
        }
        Ok(())
    }
}

#[test]
fn an_earlier_stage_can_supply_the_instance() {
    // Appended stages are sorted by phase, so this runs before Construct.
    let root = Injector::root(Platform::builder().runtime_stage(Arc::new(Prebuilt)).build());
    root.register(widget()).unwrap();
    assert!(root.get_token::<Widget>(&Token::name("Widget")).unwrap().stamped);
}

#[test]
fn without_a_construct_stage_nothing_is_produced() {
    let stages: Vec<Arc<dyn RuntimeStage>> = vec![
        Arc::new(ResolveConstructorArgs),
        Arc::new(InjectProperties),
        Arc::new(RegisterSingleton),
        Arc::new(AutoRun),
    ];
    let root = Injector::root(Platform::builder().runtime_stages(stages).build());
    root.register(widget()).unwrap();
    let err = root.get_token::<Widget>(&Token::name("Widget")).err().unwrap();
    assert!(matches!(err, IocError::Construction { .. }));
    assert_eq!(default_runtime_stages().len(), 6);
}

struct Exporter {
    format: &'static str,
}

struct Auditor;

fn auditing_root() -> Injector {
    let root = Injector::root(Platform::builder().build());
    root.register(
        TypeDescriptor::builder::<Auditor>()
            .construct(|_| Ok(Auditor))
            .ref_provider(Token::of::<Exporter>(), ProviderBinding::value(Token::name("format"), "csv"))
            .build(),
    )
    .unwrap();
    root.register(
        TypeDescriptor::builder::<Exporter>()
            .param(ParamSpec::token("format", Token::name("format")))
            .construct(|args| Ok(Exporter { format: *args.get::<&str>(0)? }))
            .build(),
    )
    .unwrap();
    root
}

#[test]
fn class_providers_apply_only_to_their_target() {
    let root = auditing_root();
    assert_eq!(root.get::<Exporter>().unwrap().format, "csv");
    assert!(root.try_get_token::<&str>(&Token::name("format")).unwrap().is_none());
    // The class scope is torn down after construction.
    assert_eq!(root.snapshot().children, 0);
}

#[test]
fn class_providers_win_over_call_scoped_ones() {
    let root = auditing_root();
    let exporter = root
        .resolve_as::<Exporter>(
            &Token::of::<Exporter>(),
            ResolveOptions::new().provider(ProviderBinding::value(Token::name("format"), "json")),
        )
        .unwrap();
    assert_eq!(exporter.format, "csv");
}

#[derive(Default)]
struct Recording(Mutex<Vec<String>>);

impl ResolutionObserver for Recording {
    fn resolving(&self, token: &Token) {
        self.0.lock().push(format!("resolving {token}"));
    }

    fn resolved(&self, token: &Token, _took: Duration) {
        self.0.lock().push(format!("resolved {token}"));
    }

    fn failed(&self, token: &Token, _error: &IocError) {
        self.0.lock().push(format!("failed {token}"));
    }

    fn registered(&self, token: &Token, _scope: &InjectorScope) {
        self.0.lock().push(format!("registered {token}"));
    }

    fn destroyed(&self, scope: &InjectorScope) {
        self.0.lock().push(format!("destroyed {scope:?}"));
    }
}

#[test]
fn observers_see_the_lifecycle() {
    let events = Arc::new(Recording::default());
    let root = Injector::root(Platform::builder().observer(events.clone()).build());
    let scope = root.create_child().unwrap();
    scope.register(widget()).unwrap();
    scope.get_token::<Widget>(&Token::name("Widget")).unwrap();
    scope
        .inject([ProviderBinding::factory(Token::name("broken"), vec![], |_| {
            Err::<u8, _>(IocError::construction_msg("broken", "boom"))
        })])
        .unwrap();
    assert!(scope.get_token::<u8>(&Token::name("broken")).is_err());
    scope.destroy();

    assert_eq!(
        *events.0.lock(),
        [
            "registered Widget",
            "resolving Widget",
            "resolved Widget",
            "registered broken",
            "resolving broken",
            "failed broken",
            "destroyed None",
        ]
    );
}

#[test]
fn tracing_observer_emits_through_the_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ferrous_ioc=trace")
        .with_test_writer()
        .try_init();

    let platform = Platform::builder()
        .observer(Arc::new(TracingObserver::with_label("pipeline-test")))
        .build();
    let root = Injector::root(platform);
    root.register(widget()).unwrap();
    assert!(root.get_token::<Widget>(&Token::name("Widget")).is_ok());
}
