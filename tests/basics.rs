use ferrous_ioc::{
    Dep, InjectFlags, Injector, IocError, ParamSpec, Platform, ProviderBinding, Resolver, Token, TypeDescriptor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn root() -> Injector {
    Injector::root(Platform::builder().build())
}

#[test]
fn values_resolve_by_name_type_and_symbol() {
    let root = root();
    let symbol = Token::symbol("FEATURE_FLAGS");
    root.set_value(Token::name("port"), 8080u16).unwrap();
    root.set_value(Token::of::<String>(), "config".to_string()).unwrap();
    root.set_value(symbol.clone(), vec!["beta"]).unwrap();

    assert_eq!(*root.get_token::<u16>(&Token::name("port")).unwrap(), 8080);
    assert_eq!(*root.get::<String>().unwrap(), "config");
    assert_eq!(*root.get_token::<Vec<&str>>(&symbol).unwrap(), vec!["beta"]);
}

#[test]
fn missing_tokens_fail_unless_optional() {
    let root = root();
    let token = Token::name("absent");
    assert!(matches!(root.get_token::<u8>(&token), Err(IocError::MissingProvider(_))));
    assert!(root.try_get_token::<u8>(&token).unwrap().is_none());
    assert!(root.get_with_flags::<u8>(&token, InjectFlags::OPTIONAL).unwrap().is_none());
}

#[test]
fn wrong_type_is_a_type_mismatch() {
    let root = root();
    root.set_value(Token::name("port"), 8080u16).unwrap();
    assert!(matches!(
        root.get_token::<String>(&Token::name("port")),
        Err(IocError::TypeMismatch(_))
    ));
}

#[test]
fn re_registration_overwrites_unless_default() {
    let root = root();
    let token = Token::name("mode");
    root.inject([ProviderBinding::value(token.clone(), "dev")]).unwrap();
    root.inject([ProviderBinding::value(token.clone(), "prod")]).unwrap();
    assert_eq!(*root.get_token::<&str>(&token).unwrap(), "prod");

    root.inject([ProviderBinding::value(token.clone(), "test").as_default()]).unwrap();
    assert_eq!(*root.get_token::<&str>(&token).unwrap(), "prod");
}

#[test]
fn factory_deps_mix_tokens_and_literals() {
    let root = root();
    root.inject([
        ProviderBinding::value(Token::name("host"), "db.local"),
        ProviderBinding::factory(
            Token::name("dsn"),
            vec![Dep::token(Token::name("host")), Dep::value(5432u16)],
            |args| Ok(format!("{}:{}", args.get::<&str>(0)?, args.get::<u16>(1)?)),
        ),
    ])
    .unwrap();
    assert_eq!(*root.get_token::<String>(&Token::name("dsn")).unwrap(), "db.local:5432");
}

#[test]
fn optional_factory_deps_resolve_to_none() {
    let root = root();
    root.inject([ProviderBinding::factory(
        Token::name("greeting"),
        vec![Dep::with_flags(Token::name("name"), InjectFlags::OPTIONAL)],
        |args| {
            let name = args.opt::<&str>(0)?.map(|n| *n).unwrap_or("stranger");
            Ok(format!("hello {name}"))
        },
    )])
    .unwrap();
    assert_eq!(*root.get_token::<String>(&Token::name("greeting")).unwrap(), "hello stranger");
}

struct Database {
    url: String,
}

struct Repository {
    db: Arc<Database>,
}

#[test]
fn class_records_construct_with_resolved_params() {
    let root = root();
    root.set_value(Token::name("db_url"), "postgres://localhost".to_string()).unwrap();
    root.register(
        TypeDescriptor::builder::<Database>()
            .param(ParamSpec::token("url", Token::name("db_url")))
            .construct(|args| Ok(Database { url: (*args.get::<String>(0)?).clone() }))
            .as_static()
            .build(),
    )
    .unwrap();
    root.register(
        TypeDescriptor::builder::<Repository>()
            .param(ParamSpec::typed::<Database>("db"))
            .construct(|args| Ok(Repository { db: args.get::<Database>(0)? }))
            .build(),
    )
    .unwrap();

    let repo = root.get::<Repository>().unwrap();
    assert_eq!(repo.db.url, "postgres://localhost");
    assert!(Arc::ptr_eq(&repo.db, &root.get::<Database>().unwrap()));
    assert_eq!(root.provider_type(&Token::of::<Repository>()).unwrap(), Some(Token::of::<Repository>()));
}

#[test]
fn registering_a_type_twice_is_a_no_op() {
    let root = root();
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let descriptor = TypeDescriptor::builder::<Database>()
        .construct(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Database { url: String::new() })
        })
        .as_static()
        .build();
    root.register(descriptor.clone()).unwrap();
    root.get::<Database>().unwrap();
    root.register(descriptor).unwrap();
    root.get::<Database>().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn unregister_removes_the_record_and_runs_its_hook() {
    let root = root();
    let token = Token::name("cache");
    root.set_value(token.clone(), 1u8).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));
    let hook = ran.clone();
    assert!(root
        .set_unregister_hook(&token, move || {
            hook.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap());

    assert!(root.unregister(&token).unwrap());
    assert!(!root.unregister(&token).unwrap());
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert!(!root.has(&token, InjectFlags::DEFAULT).unwrap());
}

#[test]
fn constructor_errors_carry_the_token() {
    let root = root();
    root.inject([ProviderBinding::factory(Token::name("flaky"), vec![], |_| {
        Err::<u8, _>(IocError::construction_msg("flaky", "connection refused"))
    })])
    .unwrap();
    let err = root.get_token::<u8>(&Token::name("flaky")).unwrap_err();
    assert_eq!(err.to_string(), "Failed to construct flaky: connection refused");
}
