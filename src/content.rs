//! Canned replies served by the default router tables

use crate::types::Article;

pub const WELCOME_TEXT: &str = "很荣幸被你关注";

pub const FALLBACK_TEXT: &str = "别乱发，没有这个选项哦";

/// Text that triggers the newest-local-image reply
pub const LATEST_IMAGE_KEYWORD: &str = "最新图片";

pub const HOW_TO_DEVELOP_KEYWORD: &str = "怎么开发微信公众号";

/// Menu click key for the curated article list (see `menu.json`)
pub const LATEST_ARTICLES_KEY: &str = "latest_articles";

fn teleport_suspense() -> Article {
    Article::new(
        "Vue3 新特性 Teleport Suspense实现原理",
        "vue3更新了两个全新的内置组件，Teleport和Suspense。让我们在实现某些效果的时候，如拟态框、异步加载等，变得十分方便。",
        "https://p6-juejin.byteimg.com/tos-cn-i-k3u1fbpfcp/38b3b365983342539cc704962cc9a676~tplv-k3u1fbpfcp-zoom-in-crop-mark:1304:0:0:0.awebp?",
        "https://juejin.cn/post/7044880716793905183",
    )
}

/// Articles for the `latest_articles` menu click
pub fn latest_articles() -> Vec<Article> {
    vec![
        teleport_suspense(),
        Article::new(
            "js一张图搞定arrayBuffer/Blob/File/fileReader/canvas/base64的各种转换操作，以及文件上传",
            "Blob 转换 base64或者image",
            "https://p9-juejin.byteimg.com/tos-cn-i-k3u1fbpfcp/8f4dfaf5a9bb43abbbb1a7ff7c47471c~tplv-k3u1fbpfcp-zoom-crop-mark:1304:1304:1304:734.awebp",
            "https://juejin.cn/post/6990980826452197407",
        ),
        Article::new(
            "你不知道的 Blob",
            "Blob (Binary Large Object) 对象表示一个不可变、原始数据的类文件对象（二进制类型的大对象）。",
            "https://img.zhouzh.tech/thumbnail/aaf4630d49b89990c42675f825120b3b53d10478-1621348992207.jpg?x-oss-process=image/format,webp",
            "https://www.zhouzh.tech/posts/4812c7b0-b63e-11eb-9938-e36f3791eca3",
        ),
    ]
}

/// Articles for the "how to develop" keyword
pub fn how_to_develop() -> Vec<Article> {
    vec![teleport_suspense()]
}
