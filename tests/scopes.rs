use ferrous_ioc::{
    InjectFlags, Injector, InjectorScope, IocError, ParamSpec, Platform, ProvidedIn, ProviderBinding, ResolveOptions,
    Resolver, Token, TypeDescriptor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn root() -> Injector {
    Injector::root(Platform::builder().build())
}

#[test]
fn children_see_parents_but_not_the_reverse() {
    let root = root();
    let child = root.create_child().unwrap();
    let grandchild = child.create_child().unwrap();

    root.set_value(Token::name("app"), "shop").unwrap();
    child.set_value(Token::name("tenant"), "acme").unwrap();

    assert_eq!(*grandchild.get_token::<&str>(&Token::name("app")).unwrap(), "shop");
    assert_eq!(*grandchild.get_token::<&str>(&Token::name("tenant")).unwrap(), "acme");
    assert!(root.try_get_token::<&str>(&Token::name("tenant")).unwrap().is_none());
}

#[test]
fn closest_definition_wins() {
    let root = root();
    let child = root.create_child().unwrap();
    let token = Token::name("level");
    root.set_value(token.clone(), "root").unwrap();
    child.set_value(token.clone(), "child").unwrap();

    assert_eq!(*child.get_token::<&str>(&token).unwrap(), "child");
    assert_eq!(*root.get_token::<&str>(&token).unwrap(), "root");
}

#[test]
fn self_and_skip_self_limit_the_search() {
    let root = root();
    let child = root.create_child().unwrap();
    let token = Token::name("level");
    root.set_value(token.clone(), "root").unwrap();
    child.set_value(token.clone(), "child").unwrap();
    root.set_value(Token::name("root_only"), 1u8).unwrap();

    let skipped = child.get_with_flags::<&str>(&token, InjectFlags::SKIP_SELF).unwrap().unwrap();
    assert_eq!(*skipped, "root");

    let local = child
        .get_with_flags::<u8>(&Token::name("root_only"), InjectFlags::SELF | InjectFlags::OPTIONAL)
        .unwrap();
    assert!(local.is_none());

    assert!(matches!(
        child.get_with_flags::<u8>(&Token::name("root_only"), InjectFlags::SELF),
        Err(IocError::MissingProvider(_))
    ));
}

struct Catalog;

#[test]
fn provided_in_root_lands_on_the_root_from_any_child() {
    let root = root();
    let child = root.create_child().unwrap();
    let owner = child
        .register(
            TypeDescriptor::builder::<Catalog>()
                .construct(|_| Ok(Catalog))
                .provided_in(ProvidedIn::Root)
                .as_static()
                .build(),
        )
        .unwrap();

    assert!(owner.ptr_eq(&root));
    assert!(root.has(&Token::of::<Catalog>(), InjectFlags::SELF).unwrap());
    assert!(!child.has(&Token::of::<Catalog>(), InjectFlags::SELF).unwrap());

    let sibling = root.create_child().unwrap();
    assert!(Arc::ptr_eq(&child.get::<Catalog>().unwrap(), &sibling.get::<Catalog>().unwrap()));
}

struct Session;

#[test]
fn provided_in_named_scope_uses_the_registered_scope() {
    let root = root();
    let request = root.create_scope("request").unwrap();
    assert_eq!(request.scope(), &InjectorScope::Named("request".into()));

    let owner = root
        .register(
            TypeDescriptor::builder::<Session>()
                .construct(|_| Ok(Session))
                .provided_in(ProvidedIn::Named("request".into()))
                .as_static()
                .build(),
        )
        .unwrap();

    assert!(owner.ptr_eq(&request));
    assert!(request.get::<Session>().is_ok());
    assert!(root.try_get::<Session>().unwrap().is_none());
}

#[test]
fn provided_in_unknown_scope_falls_back_to_the_caller() {
    let root = root();
    let child = root.create_child().unwrap();
    let owner = child
        .register(
            TypeDescriptor::builder::<Session>()
                .construct(|_| Ok(Session))
                .provided_in(ProvidedIn::Named("batch".into()))
                .build(),
        )
        .unwrap();
    assert!(owner.ptr_eq(&child));
}

#[test]
fn provided_in_platform_is_shared_by_every_scope() {
    let platform = Platform::builder().build();
    let root = Injector::root(platform.clone());
    let owner = root
        .register(
            TypeDescriptor::builder::<Catalog>()
                .construct(|_| Ok(Catalog))
                .provided_in(ProvidedIn::Platform)
                .as_static()
                .build(),
        )
        .unwrap();
    assert!(owner.ptr_eq(&platform.injector().unwrap()));
    assert_eq!(owner.scope(), &InjectorScope::Platform);
    assert!(root.create_child().unwrap().get::<Catalog>().is_ok());
}

#[test]
fn static_records_memoize_per_owner() {
    let root = root();
    let built = Arc::new(AtomicUsize::new(0));
    let descriptor = {
        let built = built.clone();
        TypeDescriptor::builder::<Catalog>()
            .construct(move |_| {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Catalog)
            })
            .as_static()
            .build()
    };
    let a = root.create_child().unwrap();
    let b = root.create_child().unwrap();
    a.register(descriptor.clone()).unwrap();
    b.register(descriptor).unwrap();

    let a1 = a.get::<Catalog>().unwrap();
    let a2 = a.get::<Catalog>().unwrap();
    let b1 = b.get::<Catalog>().unwrap();
    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b1));
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[test]
fn root_injector_is_reachable_from_deep_scopes() {
    let root = root();
    let deep = root.create_child().unwrap().create_scope("job").unwrap().create_child().unwrap();
    assert!(deep.root_injector().unwrap().ptr_eq(&root));
    assert_eq!(root.parent().map(|p| p.scope().clone()), Some(InjectorScope::Platform));
}

struct Database {
    url: String,
}

struct Handler {
    db: Arc<Database>,
}

fn database() -> TypeDescriptor {
    TypeDescriptor::builder::<Database>()
        .param(ParamSpec::token("url", Token::name("url")))
        .construct(|args| Ok(Database { url: args.get::<&str>(0)?.to_string() }))
        .as_static()
        .build()
}

fn handler() -> TypeDescriptor {
    TypeDescriptor::builder::<Handler>()
        .param(ParamSpec::typed::<Database>("db"))
        .construct(|args| Ok(Handler { db: args.get::<Database>(0)? }))
        .build()
}

#[test]
fn parent_records_resolve_their_deps_from_the_owner() {
    let root = root();
    root.set_value(Token::name("url"), "postgres://root").unwrap();
    root.register(database()).unwrap();

    let child = root.create_child().unwrap();
    child.set_value(Token::name("url"), "postgres://child").unwrap();
    child.register(handler()).unwrap();

    let handler = child.get::<Handler>().unwrap();
    assert_eq!(handler.db.url, "postgres://root");

    child.destroy();
    assert_eq!(root.get::<Database>().unwrap().url, "postgres://root");
}

#[test]
fn child_overrides_never_reach_parent_statics_through_calls() {
    let root = root();
    root.set_value(Token::name("url"), "postgres://root").unwrap();
    root.register(database()).unwrap();

    let child = root.create_child().unwrap();
    child.set_value(Token::name("url"), "postgres://child").unwrap();

    let db = child
        .resolve_as::<Database>(&Token::of::<Database>(), ResolveOptions::new().argument("unused", 1u8))
        .unwrap();
    assert_eq!(db.url, "postgres://root");
    assert_eq!(*child.get_token::<&str>(&Token::name("url")).unwrap(), "postgres://child");
}

#[test]
fn call_scoped_providers_still_reach_nested_constructions() {
    let root = root();
    root.register(
        TypeDescriptor::builder::<Database>()
            .param(ParamSpec::token("url", Token::name("url")))
            .construct(|args| Ok(Database { url: args.get::<&str>(0)?.to_string() }))
            .build(),
    )
    .unwrap();
    root.register(handler()).unwrap();

    let handler = root
        .resolve_as::<Handler>(
            &Token::of::<Handler>(),
            ResolveOptions::new().provider(ProviderBinding::value(Token::name("url"), "sqlite::memory:")),
        )
        .unwrap();
    assert_eq!(handler.db.url, "sqlite::memory:");
}
