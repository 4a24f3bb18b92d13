//! Nested relationship routes: `/:type/:id/:relation`.

mod common;

use axum::http::StatusCode;
use common::{get, router, texts, uri};
use serde_json::Value;

#[tokio::test]
async fn comments_of_an_article_carry_metadata_at_every_level() {
    let app = router();
    let res = get(&app, "/articles/1/comments").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["content-type"], common::JSONAPI);

    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(res.body["meta"]["total"], 3);

    let first = &data[0];
    assert_eq!(first["id"], "1");
    assert_eq!(first["type"], "comments");
    assert!(first["attributes"]["text"].as_str().unwrap().contains("Nice"));
    assert!(first["attributes"]["created-at"].is_string());
    assert!(first["attributes"].get("createdAt").is_none());
    assert_eq!(first["relationships"].as_object().unwrap().len(), 2);
    assert_eq!(
        first["relationships"]["author"]["links"]["related"]["href"],
        "http://localhost:1337/comments/1/author"
    );
    assert_eq!(first["relationships"]["author"]["links"]["related"]["meta"]["count"], 1);
}

#[tokio::test]
async fn unknown_relationship_is_a_single_bad_request() {
    let app = router();
    let res = get(&app, "/articles/1/notarealrelationship").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let errors = res.body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["title"], "Bad Request");
    assert!(errors[0]["detail"].is_string());
}

#[tokio::test]
async fn to_one_relation_renders_a_single_resource() {
    let app = router();
    let res = get(&app, "/comments/2/author").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["meta"]["total"], 1);

    let data = &res.body["data"];
    assert_eq!(data["id"], "3");
    assert_eq!(data["type"], "authors");
    assert!(data["attributes"]["created-at"].is_string());
    assert!(data["attributes"].get("createdAt").is_none());
    assert_eq!(data["relationships"].as_object().unwrap().len(), 3);
    assert_eq!(
        data["relationships"]["comments"]["links"]["related"]["href"],
        "http://localhost:1337/authors/3/comments"
    );
    assert_eq!(data["relationships"]["comments"]["links"]["related"]["meta"]["count"], 2);
}

#[tokio::test]
async fn junction_relation_with_included_publishers_dedupes() {
    let app = router();
    let res = get(&app, "/publishers/1/authors?include=publishers").await;
    assert_eq!(res.status, StatusCode::OK);

    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(res.body["meta"]["total"], 2);

    let cob = &data[1];
    assert_eq!(cob["id"], "3");
    assert_eq!(cob["type"], "authors");
    assert_eq!(cob["attributes"]["name"], "Cob");
    assert_eq!(
        cob["relationships"]["publishers"]["links"]["related"]["href"],
        "http://localhost:1337/authors/3/publishers"
    );
    assert_eq!(cob["relationships"]["publishers"]["links"]["related"]["meta"]["count"], 2);
    assert_eq!(data[0]["relationships"]["publishers"]["links"]["related"]["meta"]["count"], 1);

    let included = res.body["included"].as_array().unwrap();
    assert_eq!(included.len(), 2);
    assert!(included.iter().all(|r| r["type"] == "publishers"));
}

#[tokio::test]
async fn filters_narrow_data_but_not_the_total() {
    let app = router();
    let res = get(&app, &uri("/articles/1/comments", &[("text[contains]", "Terrible")])).await;
    assert_eq!(texts(&res.body), vec!["Terrible article..."]);
    assert_eq!(res.body["meta"]["total"], 3);

    let res = get(&app, &uri("/articles/1/comments", &[("text[contains]", "EMPTY YO")])).await;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 0);
    assert_eq!(res.body["meta"]["total"], 3);
}

#[tokio::test]
async fn skip_and_limit_page_the_relation() {
    let app = router();
    let res = get(&app, "/articles/1/comments?limit=1").await;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(res.body["meta"]["total"], 3);

    let res = get(&app, "/articles/1/comments?skip=2").await;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(res.body["meta"]["total"], 3);
}

#[tokio::test]
async fn sort_forms() {
    let app = router();
    let asc = vec!["A great try.", "Nice article!", "Terrible article..."];
    let desc: Vec<&str> = asc.iter().rev().copied().collect();

    let res = get(&app, &uri("/articles/1/comments", &[("sort", "text ASC")])).await;
    assert_eq!(texts(&res.body), asc);
    let res = get(&app, &uri("/articles/1/comments", &[("sort", "text DESC")])).await;
    assert_eq!(texts(&res.body), desc);
    let res = get(&app, &uri("/articles/1/comments", &[("sort", r#"[{"text":"ASC"}]"#)])).await;
    assert_eq!(texts(&res.body), asc);
    let res = get(&app, &uri("/articles/1/comments", &[("sort", r#"[{"text":"DESC"}]"#)])).await;
    assert_eq!(texts(&res.body), desc);
    assert_eq!(res.body["meta"]["total"], 3);

    let res = get(
        &app,
        &uri("/articles/1/comments", &[("sort", r#"[{"author":"ASC"},{"text":"ASC"}]"#)]),
    )
    .await;
    assert_eq!(texts(&res.body), vec!["Nice article!", "A great try.", "Terrible article..."]);
}

#[tokio::test]
async fn included_authors_carry_their_own_counts() {
    let app = router();
    let res = get(&app, "/articles/1/comments?include=author").await;
    let included = res.body["included"].as_array().unwrap();
    assert_eq!(included.len(), 2);
    for record in included {
        assert_eq!(record["type"], "authors");
        let id = record["id"].as_str().unwrap();
        let rels = &record["relationships"];
        assert_eq!(
            rels["articles"]["links"]["related"]["href"],
            format!("http://localhost:1337/authors/{}/articles", id)
        );
        let comments = &rels["comments"]["links"]["related"]["meta"]["count"];
        match id {
            "1" => assert_eq!(comments, 1),
            "3" => assert_eq!(comments, 2),
            other => panic!("unexpected author {}", other),
        }
        assert_eq!(rels["articles"]["links"]["related"]["meta"]["count"], 1);
    }
    let first = &res.body["data"][0];
    assert_eq!(first["relationships"]["author"]["data"]["id"], "1");
}

#[tokio::test]
async fn fields_on_singular_relation_target() {
    let app = router();
    let res = get(&app, &uri("/articles/1/author", &[("fields[authors]", "name")])).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["data"]["attributes"]["name"].is_string());
    assert!(res.body["data"]["attributes"].get("age").is_none());
}

#[tokio::test]
async fn empty_fields_drop_attributes() {
    let app = router();
    let res = get(&app, &uri("/authors/1/articles", &[("fields[articles]", "")])).await;
    assert_eq!(res.status, StatusCode::OK);
    for record in res.body["data"].as_array().unwrap() {
        assert!(record.get("attributes").is_none());
    }
}

#[tokio::test]
async fn fields_combine_with_include() {
    let app = router();
    let res = get(
        &app,
        &uri(
            "/articles/1/author",
            &[("include", "articles"), ("fields[authors]", "name"), ("fields[articles]", "")],
        ),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["data"]["attributes"]["name"].is_string());
    assert!(res.body["data"]["attributes"].get("age").is_none());
    let included = res.body["included"].as_array().unwrap();
    assert!(!included.is_empty());
    for record in included {
        assert_eq!(record["type"], "articles");
        assert!(record.get("attributes").is_none());
    }

    let res = get(
        &app,
        &uri(
            "/authors/1/articles",
            &[("include", "comments"), ("fields[comments]", ""), ("fields[articles]", "")],
        ),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    for record in res.body["data"].as_array().unwrap() {
        assert_eq!(record["type"], "articles");
        assert!(record.get("attributes").is_none());
    }
    let included = res.body["included"].as_array().unwrap();
    assert_eq!(included.len(), 3);
    for record in included {
        assert_eq!(record["type"], "comments");
        assert!(record.get("attributes").is_none());
    }
}

#[tokio::test]
async fn fields_on_an_included_singular_relation_is_rejected() {
    let app = router();
    let res = get(
        &app,
        &uri("/authors/1/articles", &[("include", "author"), ("fields[author]", "name")]),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn child_id_pins_one_related_record() {
    let app = router();
    let res = get(&app, &uri("/articles/1/comments/2", &[("skip", "5")])).await;
    assert_eq!(res.status, StatusCode::OK);
    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], "2");
    assert_eq!(res.body["meta"]["total"], 3);
}

#[tokio::test]
async fn missing_to_one_target_is_null_data() {
    let app = router();
    let res = get(&app, "/publishers/3/outlet").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"], Value::Null);
    assert_eq!(res.body["meta"]["total"], 0);
}

#[tokio::test]
async fn missing_parent_is_not_found() {
    let app = router();
    let res = get(&app, "/articles/99/comments").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["errors"][0]["title"], "Not Found");
}
