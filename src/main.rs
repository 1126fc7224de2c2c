#[rocket::launch]
fn rocket() -> _ {
    classroom_api::rocket()
}
