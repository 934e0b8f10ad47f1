use utoipa::OpenApi;
use vino_trivia_back::services::documentation::ApiDoc;

fn main() {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json().unwrap());
}
