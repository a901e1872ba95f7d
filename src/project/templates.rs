//! Fixed template set for scaffolding and eject
//!
//! Pure functions from (project name, author, variant) to file content.
//! No filesystem access here; write ordering lives in `scaffold`.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

/// Starter-code variant for the generated `src/Main.elm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarterKind {
    #[default]
    Sandbox,
    Element,
    Document,
    Application,
}

impl StarterKind {
    /// Resolve a selector string. Unknown selectors fall back to the default
    /// variant instead of failing the create operation.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            None => Self::default(),
            Some("sandbox") => Self::Sandbox,
            Some("element") => Self::Element,
            Some("document") => Self::Document,
            Some("application") => Self::Application,
            Some(other) => {
                warn!(selector = other, "Unknown starter variant, using default");
                Self::default()
            }
        }
    }
}

/// Project marker file content, written last during scaffolding.
pub fn marker(name: &str, author: Option<&str>) -> String {
    let mut body = json!({
        "name": name,
        "tests": { "status": null },
    });
    if let Some(author) = author {
        body["author"] = json!(author);
    }
    // to_string_pretty on a json! literal cannot fail
    serde_json::to_string_pretty(&body).unwrap_or_default()
}

pub fn index_html(name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta http-equiv="x-ua-compatible" content="ie=edge" />
    <meta
      name="viewport"
      content="width=device-width, initial-scale=1, shrink-to-fit=no"
    />
    <title>{name}</title>
  </head>
  <body>
    <noscript>
      JavaScript is required to run this app.
    </noscript>
    <div id="root"></div>
    <script src="index.js"></script>
  </body>
</html>
"#
    )
}

pub fn index_js() -> String {
    r#"import { Elm } from "./Main.elm";

Elm.Main.init({ node: document.getElementById("root") });
"#
    .to_string()
}

/// Elm manifest. The application variant additionally depends on `elm/url`
/// for navigation.
pub fn elm_json(kind: StarterKind) -> String {
    let mut direct = json!({
        "elm/browser": "1.0.2",
        "elm/core": "1.0.5",
        "elm/html": "1.0.0"
    });
    if kind == StarterKind::Application {
        direct["elm/url"] = json!("1.0.0");
    }
    let manifest = json!({
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": direct,
            "indirect": {}
        },
        "test-dependencies": {
            "direct": {},
            "indirect": {}
        }
    });
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}

pub fn readme(name: &str) -> String {
    format!(
        "# {name}\n\nThis project was created with [Grove](https://github.com/wolfadex/grove).\n"
    )
}

pub fn gitignore() -> String {
    "node_modules/\ndist/\n.cache/\nelm-stuff/\n".to_string()
}

/// Standalone manifest written only on eject; managed projects are built by
/// the orchestrator and do not need their own scripts.
pub fn package_json(name: &str, author: &str, email: Option<&str>) -> String {
    let author_field = match email {
        Some(email) => json!({ "name": author, "email": email }),
        None => json!({ "name": author }),
    };
    let manifest = json!({
        "name": name,
        "version": "1.0.0",
        "author": author_field,
        "license": "MIT",
        "scripts": {
            "dev": "parcel src/index.html",
            "build": "parcel build src/index.html"
        },
        "devDependencies": {
            "elm": "^0.19.1-3",
            "parcel-bundler": "^1.12.4"
        }
    });
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}

pub fn main_elm(kind: StarterKind, name: &str) -> String {
    match kind {
        StarterKind::Sandbox => sandbox(name),
        StarterKind::Element => element(name),
        StarterKind::Document => document(name),
        StarterKind::Application => application(name),
    }
}

fn sandbox(name: &str) -> String {
    format!(
        r#"module Main exposing (Model, Msg, init, main, update, view)

import Browser
import Html exposing (Html)


main : Program () Model Msg
main =
    Browser.sandbox
        {{ init = init
        , update = update
        , view = view
        }}


type alias Model =
    {{}}


type Msg
    = NoOp


init : Model
init =
    {{}}


update : Msg -> Model -> Model
update msg model =
    case msg of
        NoOp ->
            model


view : Model -> Html Msg
view model =
    Html.div []
        [ Html.text "Hello, {name}!" ]
"#
    )
}

fn element(name: &str) -> String {
    format!(
        r#"module Main exposing (Model, Msg, init, main, subscriptions, update, view)

import Browser
import Html exposing (Html)


main : Program () Model Msg
main =
    Browser.element
        {{ init = init
        , subscriptions = subscriptions
        , update = update
        , view = view
        }}


type alias Model =
    {{}}


type Msg
    = NoOp


init : () -> ( Model, Cmd Msg )
init _ =
    ( {{}}, Cmd.none )


subscriptions : Model -> Sub Msg
subscriptions _ =
    Sub.none


update : Msg -> Model -> ( Model, Cmd Msg )
update msg model =
    case msg of
        NoOp ->
            ( model, Cmd.none )


view : Model -> Html Msg
view model =
    Html.div []
        [ Html.text "Hello, {name}!" ]
"#
    )
}

fn document(name: &str) -> String {
    format!(
        r#"module Main exposing (Model, Msg, init, main, subscriptions, update, view)

import Browser exposing (Document)
import Html exposing (Html)


main : Program () Model Msg
main =
    Browser.document
        {{ init = init
        , subscriptions = subscriptions
        , update = update
        , view = view
        }}


type alias Model =
    {{}}


type Msg
    = NoOp


init : () -> ( Model, Cmd Msg )
init _ =
    ( {{}}, Cmd.none )


subscriptions : Model -> Sub Msg
subscriptions _ =
    Sub.none


update : Msg -> Model -> ( Model, Cmd Msg )
update msg model =
    case msg of
        NoOp ->
            ( model, Cmd.none )


view : Model -> Document Msg
view model =
    {{ title = "{name}"
    , body =
        [ Html.text "Hello, {name}!" ]
    }}
"#
    )
}

fn application(name: &str) -> String {
    format!(
        r#"module Main exposing (Model, Msg, init, main, subscriptions, update, view)

import Browser exposing (Document)
import Browser.Navigation as Nav
import Html exposing (Html)
import Url


main : Program () Model Msg
main =
    Browser.application
        {{ init = init
        , view = view
        , update = update
        , subscriptions = subscriptions
        , onUrlChange = UrlChanged
        , onUrlRequest = LinkClicked
        }}


type alias Model =
    {{ key : Nav.Key }}


type Msg
    = NoOp
    | LinkClicked Browser.UrlRequest
    | UrlChanged Url.Url


init : () -> Url.Url -> Nav.Key -> ( Model, Cmd Msg )
init _ url key =
    ( {{ key = key }}
    , Cmd.none
    )


subscriptions : Model -> Sub Msg
subscriptions _ =
    Sub.none


update : Msg -> Model -> ( Model, Cmd Msg )
update msg model =
    case msg of
        NoOp ->
            ( model, Cmd.none )

        LinkClicked urlRequest ->
            case urlRequest of
                Browser.Internal url ->
                    ( model
                    , Nav.pushUrl model.key (Url.toString url)
                    )

                Browser.External href ->
                    ( model
                    , Nav.load href
                    )

        UrlChanged url ->
            ( model, Cmd.none )


view : Model -> Document Msg
view model =
    {{ title = "{name}"
    , body =
        [ Html.text "Hello, {name}!" ]
    }}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_selector_falls_back_to_default() {
        assert_eq!(StarterKind::from_selector(Some("bogus")), StarterKind::Sandbox);
        assert_eq!(StarterKind::from_selector(None), StarterKind::Sandbox);
        assert_eq!(
            StarterKind::from_selector(Some("application")),
            StarterKind::Application
        );
    }

    #[test]
    fn marker_is_valid_json() {
        let raw = marker("demo", Some("alice"));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["name"], "demo");
        assert_eq!(value["author"], "alice");
        assert!(value["tests"]["status"].is_null());
    }

    #[test]
    fn starters_use_their_browser_entry() {
        assert!(main_elm(StarterKind::Sandbox, "x").contains("Browser.sandbox"));
        assert!(main_elm(StarterKind::Element, "x").contains("Browser.element"));
        assert!(main_elm(StarterKind::Document, "x").contains("Browser.document"));
        assert!(main_elm(StarterKind::Application, "x").contains("Browser.application"));
    }

    #[test]
    fn application_manifest_includes_url_dependency() {
        assert!(elm_json(StarterKind::Application).contains("elm/url"));
        assert!(!elm_json(StarterKind::Sandbox).contains("elm/url"));
    }
}
