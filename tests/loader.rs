use async_trait::async_trait;
use ferrous_ioc::{
    DescriptorSource, Injector, IocError, IocResult, LoadedModule, Platform, ProviderBinding, Resolver, Token,
    TypeDescriptor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Delayed {
    delay: Duration,
    module: LoadedModule,
}

#[async_trait]
impl DescriptorSource for Delayed {
    async fn load(&self) -> IocResult<LoadedModule> {
        tokio::time::sleep(self.delay).await;
        Ok(self.module.clone())
    }
}

struct Failing;

#[async_trait]
impl DescriptorSource for Failing {
    async fn load(&self) -> IocResult<LoadedModule> {
        Err(IocError::construction_msg("remote manifest", "connection reset"))
    }
}

struct Cache;

#[tokio::test]
async fn modules_register_in_source_order_regardless_of_completion() {
    let root = Injector::root(Platform::builder().build());
    let slow = Delayed {
        delay: Duration::from_millis(30),
        module: LoadedModule::new().provider(ProviderBinding::value(Token::name("region"), "us-east-1")),
    };
    let fast = Delayed {
        delay: Duration::from_millis(1),
        module: LoadedModule::new().provider(ProviderBinding::value(Token::name("region"), "eu-west-1")),
    };

    let sources: Vec<Arc<dyn DescriptorSource>> = vec![Arc::new(slow), Arc::new(fast)];
    root.load(&sources).await.unwrap();

    // The later source overwrites the earlier one.
    assert_eq!(*root.get_token::<&str>(&Token::name("region")).unwrap(), "eu-west-1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_descriptors_register_once() {
    let root = Injector::root(Platform::builder().build());
    let built = Arc::new(AtomicUsize::new(0));
    let cache = {
        let built = built.clone();
        TypeDescriptor::builder::<Cache>()
            .construct(move |_| {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Cache)
            })
            .as_static()
            .build()
    };

    let sources: Vec<Arc<dyn DescriptorSource>> = vec![
        Arc::new(LoadedModule::new().descriptor(cache.clone())),
        Arc::new(LoadedModule::new().descriptor(cache)),
    ];
    assert_eq!(root.load(&sources).await.unwrap(), 1);
    root.get::<Cache>().unwrap();
    root.get::<Cache>().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_failing_source_aborts_before_registration() {
    let root = Injector::root(Platform::builder().build());
    let sources: Vec<Arc<dyn DescriptorSource>> = vec![
        Arc::new(LoadedModule::new().provider(ProviderBinding::value(Token::name("feature"), true))),
        Arc::new(Failing),
    ];
    let err = root.load(&sources).await.unwrap_err();
    assert!(err.to_string().contains("connection reset"));
    assert!(root.try_get_token::<bool>(&Token::name("feature")).unwrap().is_none());
}

#[tokio::test]
async fn loading_into_a_destroyed_injector_fails() {
    let root = Injector::root(Platform::builder().build());
    let scope = root.create_child().unwrap();
    scope.destroy();
    let err = scope.load(&[Arc::new(LoadedModule::new()) as Arc<dyn DescriptorSource>]).await.unwrap_err();
    assert!(err.is_destroyed());
}
