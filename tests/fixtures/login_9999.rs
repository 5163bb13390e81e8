/// LoginParams user login
pub struct LoginParams {
    /// jwt token
    #[valid = "required"]
    pub jwt: String,
    #[valid = "optional"]
    pub device: Option<Device>,
    #[valid = "-"]
    pub trace: String,
}

pub struct Device {
    /// os device os
    #[valid = "required"]
    pub os: String,
}

pub struct LoginResp {
    /// system_time server time
    pub system_time: i64,
    pub roles: Vec<Role>,
}

pub struct Role {
    pub name: String,
}
