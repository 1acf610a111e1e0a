use std::collections::HashMap;

use actix_http::header::{self, HeaderValue};
use actix_rewrite::{Dialect, Engine};
use actix_web::{
    App, HttpRequest, HttpResponse, Responder, body,
    dev::{Service, ServiceResponse},
    get,
    test::{self, TestRequest},
    web,
};
use serde::{Deserialize, Serialize};

type QueryMap = web::Query<HashMap<String, String>>;

#[derive(Debug, Serialize, Deserialize)]
struct Response {
    path: String,
    query: HashMap<String, String>,
}

#[get("/index.php")]
async fn index(req: HttpRequest, query: QueryMap) -> impl Responder {
    HttpResponse::Ok().json(Response {
        path: req.path().to_string(),
        query: query.into_inner(),
    })
}

#[get("/mobile/{page}")]
async fn mobile(req: HttpRequest) -> impl Responder {
    HttpResponse::Ok().body(format!("mobile {}", req.match_info().query("page")))
}

async fn read_json(res: ServiceResponse) -> Response {
    let data = body::to_bytes(res.into_body()).await.unwrap();
    serde_json::from_slice(&data).unwrap()
}

fn location<B>(res: &ServiceResponse<B>) -> Option<&HeaderValue> {
    res.headers().get(header::LOCATION)
}

async fn service(
    engine: Engine,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .wrap(engine.middleware())
            .service(index)
            .service(mobile),
    )
    .await
}

#[actix_web::test]
async fn basic_rewrite() {
    let engine = Engine::from_rules(
        r#"
        RewriteRule ^/redirect/(.*) /new/$1            [NE,R]
        RewriteRule ^/one/([\w/]*)  /index.php?page=$1 [QSA,L]
        RewriteRule ^/blocked/      -                  [F]
        RewriteRule ^/removed/      -                  [G]
    "#,
        Dialect::Directive,
    );
    assert!(engine.inner().status().ok);
    let srv = service(engine).await;

    let req = TestRequest::with_uri("/redirect/hello/world").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().to_string(), "302 Found");
    assert_eq!(
        location(&res),
        Some(&HeaderValue::from_static("/new/hello/world"))
    );

    let req = TestRequest::with_uri("/one/1/2/3?a=b").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().to_string(), "200 OK");

    let json = read_json(res).await;
    assert_eq!(json.path, "/index.php");
    assert_eq!(json.query.len(), 2);
    assert_eq!(json.query.get("a"), Some(&"b".to_string()));
    assert_eq!(json.query.get("page"), Some(&"1/2/3".to_string()));

    let req = TestRequest::with_uri("/blocked/secret").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 403);

    let req = TestRequest::with_uri("/removed/page").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 410);

    let req = TestRequest::with_uri("/index.php?x=1").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(read_json(res).await.query.get("x"), Some(&"1".to_string()));
}

#[actix_web::test]
async fn header_conditions() {
    let engine = Engine::from_rules(
        r#"
        RewriteCond %{HTTP_USER_AGENT} (Android|iPhone)
        RewriteRule ^/shop/(\w+)$ /mobile/$2-%1 [L]

        RewriteCond %{HTTP_HOST} !^www\.example\.com$ [NC]
        RewriteRule ^/(.*)$ http://www.example.com/$1 [R=301,L]
    "#,
        Dialect::Directive,
    );
    let srv = service(engine).await;

    let req = TestRequest::with_uri("/shop/cart")
        .insert_header(("host", "www.example.com"))
        .insert_header((header::USER_AGENT, "iPhone OS 17"))
        .to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 200);
    let body = body::to_bytes(res.into_body()).await.unwrap();
    assert_eq!(body, "mobile cart-iPhone");

    let req = TestRequest::with_uri("/index.php?x=1")
        .insert_header(("host", "example.com"))
        .to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 301);
    assert_eq!(
        location(&res),
        Some(&HeaderValue::from_static("http://www.example.com/index.php?x=1"))
    );

    let req = TestRequest::with_uri("/index.php")
        .insert_header(("host", "WWW.Example.com"))
        .to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 200);
}

#[actix_web::test]
async fn escaped_expansion() {
    let engine = Engine::from_rules(
        r#"
        RewriteCond %{HTTP_USER_AGENT} ^(.*)$
        RewriteRule ^/ua$ /mobile/%1 [L]

        RewriteRule ^/maintenance$ - [R=503]
    "#,
        Dialect::Directive,
    );
    let srv = service(engine).await;

    let req = TestRequest::with_uri("/ua")
        .insert_header((header::USER_AGENT, "Mozilla/5.0 (X11)"))
        .to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 404);

    let req = TestRequest::with_uri("/ua")
        .insert_header((header::USER_AGENT, "Lynx 2.9"))
        .to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 200);
    let body = body::to_bytes(res.into_body()).await.unwrap();
    assert!(body.starts_with(b"mobile Lynx"));

    let req = TestRequest::with_uri("/maintenance").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 503);
}

#[actix_web::test]
async fn absolute_forward_redirects() {
    let engine = Engine::from_rules(
        "RewriteRule ^/docs/(.*)$ https://docs.example.com/$1\n",
        Dialect::Directive,
    );
    let srv = service(engine).await;

    let req = TestRequest::with_uri("/docs/intro").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 302);
    assert_eq!(
        location(&res),
        Some(&HeaderValue::from_static("https://docs.example.com/intro"))
    );
}

#[actix_web::test]
async fn declarative_rules() {
    let engine = Engine::from_rules(
        r#"
rules:
  - from: ^/legacy/(\w+)$
    to: /index.php?page=$1
    last: true
  - from: ^/moved$
    to: /index.php
    type: permanent-redirect
  - from: /private/**
    match_type: wildcard
    to: "-"
    type: forbidden
"#,
        Dialect::Declarative,
    );
    assert!(engine.inner().status().ok);
    let srv = service(engine).await;

    let req = TestRequest::with_uri("/legacy/about").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 200);
    let json = read_json(res).await;
    assert_eq!(json.path, "/index.php");
    assert_eq!(json.query.get("page"), Some(&"about".to_string()));

    let req = TestRequest::with_uri("/moved").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 301);
    assert_eq!(location(&res), Some(&HeaderValue::from_static("/index.php")));

    let req = TestRequest::with_uri("/private/keys").to_request();
    let res = test::call_service(&srv, req).await;
    assert_eq!(res.status().as_u16(), 403);
}
