/// Member family member
pub struct Member {
    #[dcapi("resp; desc:member name")]
    pub name: String,
    #[dcapi("resp; def:0.5")]
    pub weight: f64,
    #[dcapi("resp")]
    pub parent: Option<Box<Member>>,
    #[dcapi("req")]
    pub token: String,
}
