/// Demo2000 query family
pub struct Demo2000 {
    #[dcapi("req; alias:fid; desc:family id; def:1001")]
    pub family_id: i64,
    #[dcapi("req; alias:verbose; def:true")]
    pub verbose: bool,
    #[dcapi("resp; desc:members")]
    pub members: Vec<Member>,
    #[dcapi("resp; alias:hook")]
    pub hook: Box<dyn std::any::Any>,
    #[dcapi("-")]
    pub internal: String,
    pub untagged: String,
}
